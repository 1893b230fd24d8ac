//! Git plumbing: locations, the git CLI, local repositories and transport.

mod advertisement;
pub(crate) mod command;
mod local;
pub mod location;
pub(crate) mod transport;

pub use advertisement::RefAdvertisement;
pub use local::{LocalRepo, RepoShape};
pub use location::{RemoteUrl, RepositoryLocation, Scheme, ServiceHost};
