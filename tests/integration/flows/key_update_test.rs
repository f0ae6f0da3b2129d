// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for the key update request (kur/kup) flow

use crate::integration::{
    certificate, csr_model, fixture, init_tracing, old_certificate_model, private_key,
    CaProtection, CaResponder, MockCmpServer, IAK,
};
use usg_cmpv2_client::protection::verify_signature;
use usg_cmpv2_client::types::PkiBody;
use usg_cmpv2_client::{CertificateUpdateModel, CmpClient, CmpClientConfig, CsrModel};

fn update_model() -> CertificateUpdateModel {
    CertificateUpdateModel::new(csr_model(), old_certificate_model())
}

async fn client(anchors: &[&str]) -> CmpClient {
    let config = anchors
        .iter()
        .fold(CmpClientConfig::builder(), |builder, name| {
            builder.response_trust_anchor(certificate(name))
        })
        .build()
        .expect("Valid config");
    CmpClient::new(config).await.expect("Client creation failed")
}

#[tokio::test]
async fn test_key_update_verified_with_old_certificate() {
    init_tracing();

    // Mock CA signs with the key of the certificate being renewed
    let mock = MockCmpServer::start().await;
    mock.mock_ca(
        CaResponder::accepting()
            .protected_by(CaProtection::Signature(private_key("old-client.key"))),
    )
    .await;

    let model = client(&[])
        .await
        .key_update_request(&update_model(), &mock.server(IAK))
        .await
        .expect("key_update_request failed");

    assert_eq!(model.entity_certificate(), &certificate("client-issued.pem"));
    assert_eq!(model.chain(), &[certificate("issuing-ca.pem")]);
    assert_eq!(model.trusted_roots(), &[certificate("root-ca.pem")]);
}

#[tokio::test]
async fn test_key_update_request_wire_format() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().protected_by(CaProtection::issuing_ca()))
        .await;

    let update = update_model();
    client(&["issuing-ca.pem"])
        .await
        .key_update_request(&update, &mock.server(IAK))
        .await
        .expect("key_update_request failed");

    let received = mock.received_messages().await;
    let request = &received[0];

    assert!(matches!(request.body, PkiBody::Kur(_)));
    assert_eq!(request.extra_certs(), &[update.old.certificate().clone()]);
    assert!(request.header.sender_kid.is_none());
    assert!(verify_signature(
        &request.header,
        &request.body,
        request.protection_bytes().unwrap(),
        &update.old.public_key().unwrap()
    )
    .unwrap());
}

#[tokio::test]
async fn test_key_update_signer_vouched_by_root() {
    // Issuing CA certificate travels in extraCerts and chains to the anchor
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().protected_by(CaProtection::issuing_ca()))
        .await;

    let model = client(&["root-ca.pem"])
        .await
        .key_update_request(&update_model(), &mock.server(IAK))
        .await
        .expect("key_update_request failed");
    assert_eq!(model.entity_certificate(), &certificate("client-issued.pem"));
}

#[tokio::test]
async fn test_key_update_untrusted_signer() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(
        CaResponder::accepting().protected_by(CaProtection::Signature(private_key("root-ca.key"))),
    )
    .await;

    let err = client(&[])
        .await
        .key_update_request(&update_model(), &mock.server(IAK))
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_update_with_same_identity_sends_key_update() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(
        CaResponder::accepting()
            .protected_by(CaProtection::Signature(private_key("old-client.key"))),
    )
    .await;

    let update = update_model();
    assert!(update.is_key_update());

    client(&[])
        .await
        .update_request(&update, &mock.server(IAK))
        .await
        .expect("update_request failed");

    let received = mock.received_messages().await;
    assert!(matches!(received[0].body, PkiBody::Kur(_)));
}

#[tokio::test]
async fn test_update_with_changed_identity_sends_certification_request() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting()).await;

    // New CSR renames the subject and one SAN
    let csr = CsrModel::new(
        fixture("renamed.csr").as_bytes(),
        fixture("client.key").as_bytes(),
    )
    .expect("Valid CSR fixture");
    let update = CertificateUpdateModel::new(csr, old_certificate_model());
    assert!(!update.is_key_update());

    client(&[])
        .await
        .update_request(&update, &mock.server(IAK))
        .await
        .expect("update_request failed");

    let received = mock.received_messages().await;
    let request = &received[0];
    assert!(matches!(request.body, PkiBody::Cr(_)));
    assert!(request.extra_certs().is_empty());
    assert!(request
        .header
        .sender_name()
        .is_some_and(|name| name.to_string().contains("CN=renamed.onap.org")));
}
