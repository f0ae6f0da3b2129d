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

//! Integration tests for the certification request (cr/cp) flow

use std::time::Duration;

use crate::integration::{
    certificate, csr_model, old_certificate_model, CaProtection, CaResponder, MockCmpServer, IAK,
};
use usg_cmpv2_client::protection::verify_signature;
use usg_cmpv2_client::types::PkiBody;
use usg_cmpv2_client::{CmpClient, CmpClientConfig, CmpError, CrProtection};

async fn client_trusting_issuing_ca() -> CmpClient {
    let config = CmpClientConfig::builder()
        .timeout(Duration::from_secs(5))
        .response_trust_anchor(certificate("issuing-ca.pem"))
        .build()
        .expect("Valid config");
    CmpClient::new(config).await.expect("Client creation failed")
}

#[tokio::test]
async fn test_certification_request_with_shared_secret() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting()).await;

    let client = CmpClient::new(CmpClientConfig::default()).await.unwrap();
    let model = client
        .certification_request(&csr_model(), &mock.server(IAK), None)
        .await
        .expect("certification_request failed");

    assert_eq!(model.entity_certificate(), &certificate("client-issued.pem"));
    assert_eq!(model.chain().len(), 1);
    assert_eq!(model.trusted_roots().len(), 1);

    let received = mock.received_messages().await;
    assert!(matches!(received[0].body, PkiBody::Cr(_)));
}

#[tokio::test]
async fn test_signature_protected_certification_request() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().protected_by(CaProtection::issuing_ca()))
        .await;

    let server = mock
        .server(IAK)
        .with_cr_protection(CrProtection::Signature);
    let old = old_certificate_model();

    let model = client_trusting_issuing_ca()
        .await
        .certification_request(&csr_model(), &server, Some(&old))
        .await
        .expect("certification_request failed");
    assert_eq!(model.entity_certificate(), &certificate("client-issued.pem"));

    // Request is signed with the previous key
    let received = mock.received_messages().await;
    let request = &received[0];
    assert!(request.header.sender_kid.is_none());
    assert!(verify_signature(
        &request.header,
        &request.body,
        request.protection_bytes().unwrap(),
        &old.public_key().unwrap()
    )
    .unwrap());
}

#[tokio::test]
async fn test_signature_protected_response_without_trust_anchor() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().protected_by(CaProtection::issuing_ca()))
        .await;

    let server = mock
        .server(IAK)
        .with_cr_protection(CrProtection::Signature);
    let old = old_certificate_model();

    // Only the old certificate is a candidate, and it did not sign the reply
    let err = CmpClient::new(CmpClientConfig::default())
        .await
        .unwrap()
        .certification_request(&csr_model(), &server, Some(&old))
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_signature_protection_requires_old_certificate() {
    let mock = MockCmpServer::start().await;
    let server = mock
        .server(IAK)
        .with_cr_protection(CrProtection::Signature);

    let err = client_trusting_issuing_ca()
        .await
        .certification_request(&csr_model(), &server, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CmpError::Config(_)));
    assert!(mock.received_messages().await.is_empty());
}
