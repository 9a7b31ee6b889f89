pub mod error;
pub mod middleware;
pub mod routes;

// Swap this alias to run against another deployment backend.
pub type DeploymentImpl = local_deployment::LocalDeployment;
