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

//! Integration tests for the initialization request (ir/ip) flow

use std::time::{Duration, SystemTime};

use crate::integration::{
    certificate, csr_model, init_tracing, CaProtection, CaResponder, MockCmpServer, IAK, RV,
};
use usg_cmpv2_client::protection::verify_shared_secret;
use usg_cmpv2_client::types::{PkiBody, ProofOfPossession};
use usg_cmpv2_client::{
    CmpClient, CmpClientConfig, CmpError, Cmpv2CertificationModel, Cmpv2Server, CsrModel,
    RequestedValidity,
};

async fn client() -> CmpClient {
    let config = CmpClientConfig::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Valid config");
    CmpClient::new(config).await.expect("Client creation failed")
}

#[tokio::test]
async fn test_initialization_request_accepted() {
    init_tracing();

    // Start mock CA answering with a MAC over the shared secret
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting()).await;

    // Test: Initialization request with IAK/RV protection
    let result = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await;

    // Assert: Exactly one entity certificate with its chain
    let model = result.expect("initialization_request failed");
    assert_eq!(model.entity_certificate(), &certificate("client-issued.pem"));
    assert_eq!(model.chain(), &[certificate("issuing-ca.pem")]);
    assert_eq!(model.trusted_roots(), &[certificate("root-ca.pem")]);
}

#[tokio::test]
async fn test_initialization_request_wire_format() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting()).await;

    client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .expect("initialization_request failed");

    let received = mock.received_messages().await;
    assert_eq!(received.len(), 1);
    let request = &received[0];

    // Header carries the RV and a MAC the CA can verify with the IAK
    assert_eq!(
        request.header.sender_kid.as_ref().map(|kid| kid.as_bytes()),
        Some(RV.as_bytes())
    );
    assert!(request.header.has_implicit_confirm());
    assert!(verify_shared_secret(
        &request.header,
        &request.body,
        request.protection_bytes().unwrap(),
        IAK.as_bytes()
    )
    .unwrap());

    // Body is an ir with a signature POP
    let PkiBody::Ir(requests) = &request.body else {
        panic!("Expected ir body, got {}", request.body.type_number());
    };
    assert_eq!(requests.len(), 1);
    assert!(matches!(
        requests[0].popo,
        Some(ProofOfPossession::Signature(_))
    ));
}

#[tokio::test]
async fn test_initialization_request_with_validity() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting()).await;

    let now = SystemTime::now();
    let validity = RequestedValidity::new(Some(now), Some(now + Duration::from_secs(365 * 86400)));

    client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), validity)
        .await
        .expect("initialization_request failed");

    let received = mock.received_messages().await;
    let PkiBody::Ir(requests) = &received[0].body else {
        panic!("Expected ir body");
    };
    let window = requests[0]
        .cert_req
        .cert_template
        .validity
        .as_ref()
        .expect("Validity present");
    assert!(window.not_before.is_some());
    assert!(window.not_after.is_some());
}

#[tokio::test]
async fn test_wrong_shared_secret_rejected() {
    // Start mock CA whose MAC uses a different key
    let mock = MockCmpServer::start().await;
    mock.mock_ca(
        CaResponder::accepting().protected_by(CaProtection::SharedSecret("WRONG".to_string())),
    )
    .await;

    // Test: Initialization request
    let result = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await;

    // Assert: Verification failure, no model
    let err = result.expect_err("Response with a wrong MAC must not be accepted");
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_inverted_validity_fails_before_sending() {
    let mock = MockCmpServer::start().await;

    let now = SystemTime::now();
    let validity = RequestedValidity::new(Some(now + Duration::from_secs(60)), Some(now));

    let err = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), validity)
        .await
        .unwrap_err();

    assert!(matches!(err, CmpError::Config(_)));
    assert!(mock.received_messages().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let mock = MockCmpServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(CaResponder::accepting())
        .expect(4)
        .mount(mock.inner())
        .await;

    let client = client().await;
    let server = mock.server(IAK);
    let csr = csr_model();

    let results = issue_four_concurrently(&client, &server, &csr).await;
    assert!(results.iter().all(Result::is_ok));

    let received = mock.received_messages().await;
    let mut ids: Vec<_> = received
        .iter()
        .map(|m| m.header.transaction_id().unwrap().to_vec())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

async fn issue_four_concurrently(
    client: &CmpClient,
    server: &Cmpv2Server,
    csr: &CsrModel,
) -> Vec<usg_cmpv2_client::Result<Cmpv2CertificationModel>> {
    let (a, b, c, d) = tokio::join!(
        client.initialization_request(csr, server, RequestedValidity::default()),
        client.initialization_request(csr, server, RequestedValidity::default()),
        client.initialization_request(csr, server, RequestedValidity::default()),
        client.initialization_request(csr, server, RequestedValidity::default()),
    );
    vec![a, b, c, d]
}
