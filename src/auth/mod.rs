//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
pub(crate) mod cached_provider;
pub(crate) mod config_file_provider;
pub mod facade;
pub(crate) mod instance_principal_provider;
pub(crate) mod oke_provider;
pub(crate) mod onprem_provider;
pub mod profile_provider;
pub(crate) mod resource_principal_provider;
pub(crate) mod session_token_provider;
pub mod signature_cache;
pub(crate) mod signer;
pub(crate) mod simple_provider;
