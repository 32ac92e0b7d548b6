//! # Reconcile
//!
//! Idempotent reconciliation of node classifier groups.
//!
//! A group carries a class → parameter map, an optional rule chain and
//! environment settings. This crate brings a group's stored state in line
//! with a requested state and proves each change took by re-reading it.
//!
//! ## Core Concepts
//!
//! - **Reconcilers** ([`classes`], [`rules`]): mutate an in-memory
//!   [`GroupRecord`] and report whether anything changed. Deletions are
//!   expressed as `null` markers, the way the service expects them.
//! - **Verifier** ([`verify`]): compares a re-read group against the delta
//!   that was written, accounting for nulled entries vanishing.
//! - **Session** ([`session`]): fetch, create-if-missing, write and verify.
//! - **Batch** ([`batch`]): applies a desired-state document group by group,
//!   phase by phase, with an optional code manager fast path.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{BatchDocument, BatchOptions, BatchRunner, MockClassifier, NoDeploy, NoProgress};
//!
//! let doc = BatchDocument::from_yaml_str(
//!     "'Puppet Masters':\n  classes:\n    'role::puppet::master':\n",
//!     "inline",
//! )?;
//! let service = MockClassifier::new();
//! let runner = BatchRunner::new(&service, &NoDeploy, BatchOptions::default());
//! let summary = runner.run(&doc, &mut NoProgress)?;
//! ```
//!
//! ## Collaborators
//!
//! - [`ClassifierService`]: the remote classifier
//! - [`DeploymentTrigger`]: out-of-band code deployment
//! - [`BatchProgress`]: receives progress updates
//!
//! None of them is built by this crate, so it can run against the in-memory
//! [`MockClassifier`] as easily as against a live server.

pub mod batch;
pub mod classes;
pub mod context;
pub mod edit;
pub mod error;
pub mod rules;
pub mod session;
pub mod types;
pub mod verify;

pub use batch::{
    BatchDocument, BatchOptions, BatchRunner, BatchSummary, CODE_MANAGER_CLASS,
    CODE_MANAGER_PARAMS, DEFAULT_SETTLE, GroupSpec, code_manager_settings, is_code_manager_param,
    load_document,
};
pub use classes::DesiredClasses;
pub use context::{
    BatchProgress, ClassifierService, DeploymentTrigger, MockClassifier, NoDeploy, NoProgress,
    RecordingDeploy,
};
pub use edit::{ClassEdit, ENVIRONMENT_PARENT, EditOutcome, GroupEdit, edit_classes, edit_group};
pub use error::{Error, ErrorCategory, Result};
pub use rules::RuleMode;
pub use session::{GroupUpdate, Session};
pub use types::{
    ClassEntry, Classes, Conjunction, DEFAULT_PARENT, GroupDelta, GroupRecord, NewGroup,
    ParamValue, Params, Predicate, Rule,
};
pub use verify::verify_update;
