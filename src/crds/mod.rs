pub mod clusterdeployment;
pub mod goalertintegration;
pub mod hostedcluster;
pub mod syncset;

pub use clusterdeployment::*;
pub use goalertintegration::*;
pub use hostedcluster::*;
pub use syncset::*;
