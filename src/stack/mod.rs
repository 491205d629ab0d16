//! Provisioning plan for a static site.
//!
//! # Data Flow
//! ```text
//! domain + function selection
//!     → plan.rs (validate domain, derive every resource)
//!     → StackPlan (serde) → JSON for an external provisioner
//! ```
//!
//! Nothing here talks to a cloud API; the plan is data.

pub mod plan;

pub use plan::{
    validate_domain, BucketPlan, BucketPolicyStatement, CertificatePlan, DistributionPlan,
    DnsRecord, ErrorResponsePlan, FunctionAssociationPlan, OriginAccessIdentityPlan, PlanError,
    StackOutput, StackPlan,
};
