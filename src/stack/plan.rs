//! Resource plan derived from a domain name.

use serde::Serialize;
use thiserror::Error;

use crate::config::{ErrorResponseConfig, FunctionsConfig, SiteConfig};
use crate::edge::{FunctionAssociations, Phase};

/// CloudFront only accepts certificates issued in this region.
pub const CERTIFICATE_REGION: &str = "us-east-1";
pub const MINIMUM_PROTOCOL_VERSION: &str = "TLSv1.2_2021";
pub const HTTP_VERSION: &str = "http2and3";
pub const VIEWER_PROTOCOL_POLICY: &str = "redirect-to-https";

const BUCKET_ID: &str = "SiteBucket";
const DISTRIBUTION_ID: &str = "SiteDistribution";
const OAI_ID: &str = "CloudFrontOAI";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("domain name is empty")]
    Empty,

    #[error("domain name {0:?} must not include a scheme")]
    Scheme(String),

    #[error("domain name {0:?} must be the apex domain, without www.")]
    WwwPrefix(String),

    #[error("domain name {0:?} needs at least two labels")]
    SingleLabel(String),

    #[error("domain name {domain:?} has invalid label {label:?}")]
    InvalidLabel { domain: String, label: String },

    #[error("domain name is longer than 253 characters")]
    TooLong,
}

/// Check that `domain` is a bare apex domain and return it lowercased.
pub fn validate_domain(domain: &str) -> Result<String, PlanError> {
    let domain = domain.trim().to_ascii_lowercase();

    if domain.is_empty() {
        return Err(PlanError::Empty);
    }
    if domain.contains("://") {
        return Err(PlanError::Scheme(domain));
    }
    if domain.starts_with("www.") {
        return Err(PlanError::WwwPrefix(domain));
    }
    if domain.len() > 253 {
        return Err(PlanError::TooLong);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(PlanError::SingleLabel(domain));
    }

    for label in &labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(PlanError::InvalidLabel {
                label: label.to_string(),
                domain: domain.clone(),
            });
        }
    }

    Ok(domain)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketPlan {
    pub logical_id: &'static str,
    pub bucket_name: String,
    pub public_read_access: bool,
    pub encryption: &'static str,
    pub block_public_access: &'static str,
    pub removal_policy: &'static str,
    pub auto_delete_objects: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginAccessIdentityPlan {
    pub logical_id: &'static str,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketPolicyStatement {
    pub effect: &'static str,
    pub actions: Vec<&'static str>,
    pub resources: Vec<String>,
    /// Canonical user of the origin access identity.
    pub principal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificatePlan {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub validation: &'static str,
    pub region: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponsePlan {
    pub http_status: u16,
    pub response_http_status: u16,
    pub response_page_path: String,
    pub ttl_secs: u64,
}

impl From<&ErrorResponseConfig> for ErrorResponsePlan {
    fn from(config: &ErrorResponseConfig) -> Self {
        Self {
            http_status: config.error_code,
            response_http_status: config.response_code,
            response_page_path: config.response_page_path.clone(),
            ttl_secs: config.ttl_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionAssociationPlan {
    pub event_type: Phase,
    pub function: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionPlan {
    pub logical_id: &'static str,
    pub aliases: Vec<String>,
    pub origin_bucket: &'static str,
    pub origin_access_identity: &'static str,
    pub default_root_object: &'static str,
    pub minimum_protocol_version: &'static str,
    pub http_version: &'static str,
    pub viewer_protocol_policy: &'static str,
    pub allowed_methods: Vec<&'static str>,
    pub compress: bool,
    pub error_responses: Vec<ErrorResponsePlan>,
    pub function_associations: Vec<FunctionAssociationPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DnsRecord {
    /// Alias record pointing the apex at the distribution.
    A { name: String, alias_target: &'static str },
    #[serde(rename = "CNAME")]
    Cname { name: String, target: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackOutput {
    pub name: &'static str,
    pub resource: &'static str,
    pub attribute: &'static str,
}

/// Everything needed to stand up one static site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackPlan {
    pub domain_name: String,
    pub bucket: BucketPlan,
    pub origin_access_identity: OriginAccessIdentityPlan,
    pub bucket_policy: Vec<BucketPolicyStatement>,
    pub certificate: CertificatePlan,
    pub distribution: DistributionPlan,
    pub dns_records: Vec<DnsRecord>,
    pub outputs: Vec<StackOutput>,
}

impl StackPlan {
    /// Derive the plan for `domain`, attaching the functions enabled in
    /// `functions`.
    pub fn for_domain(domain: &str, functions: &FunctionsConfig) -> Result<Self, PlanError> {
        let domain = validate_domain(domain)?;
        let www = format!("www.{domain}");

        let site = SiteConfig {
            domain_name: domain.clone(),
            ..SiteConfig::default()
        };
        let function_associations = FunctionAssociations::from_config(&site, functions)
            .describe()
            .into_iter()
            .map(|(event_type, function)| FunctionAssociationPlan {
                event_type,
                function,
            })
            .collect();

        Ok(Self {
            bucket: BucketPlan {
                logical_id: BUCKET_ID,
                bucket_name: domain.clone(),
                public_read_access: false,
                encryption: "S3_MANAGED",
                block_public_access: "BLOCK_ALL",
                removal_policy: "RETAIN",
                auto_delete_objects: false,
            },
            origin_access_identity: OriginAccessIdentityPlan {
                logical_id: OAI_ID,
                comment: format!("OAI for {domain}"),
            },
            bucket_policy: vec![BucketPolicyStatement {
                effect: "Allow",
                actions: vec!["s3:GetObject"],
                resources: vec![format!("arn:aws:s3:::{domain}/*")],
                principal: format!("{OAI_ID}.S3CanonicalUserId"),
            }],
            certificate: CertificatePlan {
                domain_name: domain.clone(),
                subject_alternative_names: vec![www.clone()],
                validation: "DNS",
                region: CERTIFICATE_REGION,
            },
            distribution: DistributionPlan {
                logical_id: DISTRIBUTION_ID,
                aliases: vec![domain.clone(), www.clone()],
                origin_bucket: BUCKET_ID,
                origin_access_identity: OAI_ID,
                default_root_object: "index.html",
                minimum_protocol_version: MINIMUM_PROTOCOL_VERSION,
                http_version: HTTP_VERSION,
                viewer_protocol_policy: VIEWER_PROTOCOL_POLICY,
                allowed_methods: vec!["GET", "HEAD", "OPTIONS"],
                compress: true,
                error_responses: vec![ErrorResponsePlan::from(&ErrorResponseConfig::default())],
                function_associations,
            },
            dns_records: vec![
                DnsRecord::A {
                    name: domain.clone(),
                    alias_target: DISTRIBUTION_ID,
                },
                DnsRecord::Cname {
                    name: www,
                    target: domain.clone(),
                },
            ],
            outputs: vec![
                StackOutput {
                    name: "SiteBucketName",
                    resource: BUCKET_ID,
                    attribute: "BucketName",
                },
                StackOutput {
                    name: "CloudFrontDistributionId",
                    resource: DISTRIBUTION_ID,
                    attribute: "DistributionId",
                },
            ],
            domain_name: domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> StackPlan {
        StackPlan::for_domain("example.com", &FunctionsConfig::default()).unwrap()
    }

    #[test]
    fn test_bucket_is_private_and_retained() {
        let bucket = plan().bucket;
        assert_eq!(bucket.bucket_name, "example.com");
        assert!(!bucket.public_read_access);
        assert_eq!(bucket.block_public_access, "BLOCK_ALL");
        assert_eq!(bucket.removal_policy, "RETAIN");
        assert!(!bucket.auto_delete_objects);
    }

    #[test]
    fn test_policy_scoped_to_oai() {
        let plan = plan();
        assert_eq!(plan.origin_access_identity.comment, "OAI for example.com");
        assert_eq!(plan.bucket_policy.len(), 1);
        assert_eq!(plan.bucket_policy[0].actions, vec!["s3:GetObject"]);
        assert_eq!(plan.bucket_policy[0].resources, vec!["arn:aws:s3:::example.com/*"]);
    }

    #[test]
    fn test_certificate_covers_www_in_us_east_1() {
        let cert = plan().certificate;
        assert_eq!(cert.subject_alternative_names, vec!["www.example.com"]);
        assert_eq!(cert.region, "us-east-1");
        assert_eq!(cert.validation, "DNS");
    }

    #[test]
    fn test_distribution_settings() {
        let dist = plan().distribution;
        assert_eq!(dist.aliases, vec!["example.com", "www.example.com"]);
        assert_eq!(dist.default_root_object, "index.html");
        assert_eq!(dist.minimum_protocol_version, "TLSv1.2_2021");
        assert_eq!(dist.allowed_methods, vec!["GET", "HEAD", "OPTIONS"]);
        assert!(dist.compress);
        assert_eq!(
            dist.error_responses,
            vec![ErrorResponsePlan {
                http_status: 403,
                response_http_status: 403,
                response_page_path: "/404.html".to_string(),
                ttl_secs: 1800,
            }]
        );
        assert_eq!(
            dist.function_associations,
            vec![
                FunctionAssociationPlan {
                    event_type: Phase::ViewerRequest,
                    function: "uri-normalizer",
                },
                FunctionAssociationPlan {
                    event_type: Phase::ViewerResponse,
                    function: "security-headers",
                },
            ]
        );
    }

    #[test]
    fn test_function_selection() {
        let functions = FunctionsConfig {
            viewer_request: true,
            viewer_response: false,
        };
        let plan = StackPlan::for_domain("example.com", &functions).unwrap();
        assert_eq!(plan.distribution.function_associations.len(), 1);
        assert_eq!(
            plan.distribution.function_associations[0].event_type,
            Phase::ViewerRequest
        );
    }

    #[test]
    fn test_dns_and_outputs_serialize() {
        let json = serde_json::to_value(plan()).unwrap();
        assert_eq!(json["dns_records"][0]["type"], "A");
        assert_eq!(json["dns_records"][1]["type"], "CNAME");
        assert_eq!(json["dns_records"][1]["name"], "www.example.com");
        assert_eq!(json["dns_records"][1]["target"], "example.com");
        assert_eq!(json["outputs"][0]["name"], "SiteBucketName");
        assert_eq!(json["outputs"][1]["name"], "CloudFrontDistributionId");
        assert_eq!(
            json["distribution"]["function_associations"][0]["event_type"],
            "viewer-request"
        );
    }

    #[test]
    fn test_domain_validation() {
        assert_eq!(validate_domain(" Example.COM ").unwrap(), "example.com");
        assert_eq!(validate_domain(""), Err(PlanError::Empty));
        assert!(matches!(validate_domain("https://example.com"), Err(PlanError::Scheme(_))));
        assert!(matches!(validate_domain("www.example.com"), Err(PlanError::WwwPrefix(_))));
        assert!(matches!(validate_domain("localhost"), Err(PlanError::SingleLabel(_))));
        assert!(matches!(validate_domain("exa_mple.com"), Err(PlanError::InvalidLabel { .. })));
        assert!(matches!(validate_domain("example..com"), Err(PlanError::InvalidLabel { .. })));
        assert!(matches!(validate_domain("-example.com"), Err(PlanError::InvalidLabel { .. })));
    }
}
