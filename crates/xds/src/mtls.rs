//! mTLS identity extraction for xDS client connections.
//!
//! Workload certificates issued inside the cluster carry a SPIFFE URI SAN
//! of the form `spiffe://<trust-domain>/ns/<namespace>/sa/<service-account>`.
//! When the xDS listener terminates mTLS, that URI is the only identity
//! trusted for [`CallerIdentity::matches`] — the request's `Node.id` is
//! never authoritative on its own.

use crate::node::CallerIdentity;
use tonic::transport::CertificateDer;
use x509_parser::prelude::*;

pub fn extract_caller_identity(peer_certs: &[CertificateDer<'_>]) -> Option<CallerIdentity> {
    let cert = peer_certs.first()?;
    let (_, parsed) = X509Certificate::from_der(cert.as_ref()).ok()?;
    let uri = spiffe_uri(&parsed)?;
    parse_spiffe_uri(&uri)
}

fn spiffe_uri(cert: &X509Certificate<'_>) -> Option<String> {
    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                if let GeneralName::URI(uri) = name {
                    if uri.starts_with("spiffe://") {
                        return Some(uri.to_string());
                    }
                }
            }
        }
    }
    None
}

fn parse_spiffe_uri(uri: &str) -> Option<CallerIdentity> {
    let rest = uri.strip_prefix("spiffe://")?;
    let (_trust_domain, path) = rest.split_once('/')?;
    let mut parts = path.split('/');
    if parts.next()? != "ns" {
        return None;
    }
    let namespace = parts.next()?.to_string();
    if parts.next()? != "sa" {
        return None;
    }
    let service_account = parts.next()?.to_string();
    Some(CallerIdentity { namespace, service_account })
}

#[cfg(test)]
mod tests {
    use super::parse_spiffe_uri;

    #[test]
    fn parses_namespace_and_service_account() {
        let id = parse_spiffe_uri("spiffe://cluster.local/ns/agw-system/sa/agentgateway").unwrap();
        assert_eq!(id.namespace, "agw-system");
        assert_eq!(id.service_account, "agentgateway");
    }

    #[test]
    fn rejects_a_non_spiffe_uri() {
        assert!(parse_spiffe_uri("https://example.com/ns/x/sa/y").is_none());
    }

    #[test]
    fn rejects_a_uri_missing_the_sa_segment() {
        assert!(parse_spiffe_uri("spiffe://cluster.local/ns/agw-system").is_none());
    }
}
