//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Client-side authorization subsystem for the Oracle NoSQL Database Rust SDK.
//!
//! This crate signs and authorizes requests destined for the
//! [Oracle NoSQL Database Cloud Service](https://www.oracle.com/database/nosql-cloud.html)
//! and the [Oracle NoSQL Database on-premises server](https://www.oracle.com/database/technologies/related/nosql.html).
//! It does not speak the NoSQL wire protocol itself; callers obtain an
//! `Authorization` header value (and, for DDL/control-plane operations, an
//! `x-content-sha256` value) from an [`Authorization`] handle and attach it
//! to their own HTTP requests.
//!
//! Two families of identity are supported:
//!
//! - **Cloud (OCI IAM)**: requests are signed with an RSA private key and
//!   presented as an HTTP Signature. The signing key can come from a user's
//!   own API key (direct values, a config file, or a caller-supplied
//!   callback), or be obtained transparently on the caller's behalf via
//!   Instance Principal, Resource Principal, a session token, or OKE
//!   workload identity.
//! - **On-premises**: requests carry a bearer token obtained by logging in
//!   to the NoSQL proxy with a username and password, supplied inline, from
//!   a JSON credentials file, or from a caller-supplied callback.
//!
//! ## Quick examples
//!
//! Signing cloud requests from a user's own OCI config file:
//! ```no_run
//! use oracle_nosql_rust_auth::Authorization;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Authorization::builder()
//!     .cloud_auth_from_file("~/.oci/config", "DEFAULT")?
//!     .build()
//!     .await?;
//! let headers = auth.get_authorization("GET", "/V2/nosql/data", None).await?;
//! auth.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Transparent credential acquisition from the instance an application is
//! running on:
//! ```no_run
//! use oracle_nosql_rust_auth::Authorization;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Authorization::builder()
//!     .cloud_auth_from_instance()?
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! On-premises login:
//! ```no_run
//! use oracle_nosql_rust_auth::Authorization;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Authorization::builder()
//!     .onprem_auth("testUser", "12345")?
//!     .endpoint("https://nosql.mycompany.com:8080")?
//!     .danger_accept_invalid_certs(true)?
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! This crate logs via [`tracing`]. Set `RUST_LOG=oracle_nosql_rust_auth=debug`
//! (or install your own subscriber) to see provider selection, cache
//! refreshes, and retry decisions.
//!
//! ## License
//!
//! Copyright (C) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//!
//! This SDK is licensed under the Universal Permissive License 1.0. See
//! [LICENSE](https://github.com/oracle/nosql-rust-sdk/blob/main/LICENSE.txt) for
//! details.
//!

pub(crate) mod auth;
pub use crate::auth::facade::{Authorization, AuthorizationBuilder};
pub use crate::auth::profile_provider::{CredentialsProvider, Profile, ProfileProvider, UserCredentials, ValueProvider, ValueSource};
pub use crate::auth::signature_cache::{SecurityToken, SignatureCacheOptions};

pub(crate) mod config;

pub(crate) mod crypto;

pub(crate) mod error;
pub use crate::error::{NoSQLError, NoSQLErrorCode};

pub(crate) mod http_client;

pub(crate) mod imds;

pub(crate) mod jwt;

pub(crate) mod region;
pub use crate::region::Region;
