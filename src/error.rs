use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {namespace}/{name} has no owner reference of kind {owner_kind}")]
    OwnershipNotFound {
        kind: &'static str,
        namespace: String,
        name: String,
        owner_kind: &'static str,
    },

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("failed to read {kind} {namespace}/{name}: {source}")]
    Lookup {
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("deployment {namespace}/{name} has no usable label selector")]
    MissingSelector { namespace: String, name: String },

    #[error("failed to write {kind} {namespace}/{name}: {source}")]
    Write {
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
