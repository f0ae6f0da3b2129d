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

//! Integration tests for protocol error handling

use crate::integration::{
    certificate, csr_model, CaProtection, CaResponder, MockCmpServer, IAK,
};
use usg_cmpv2_client::transport::MAX_RESPONSE_SIZE;
use usg_cmpv2_client::{CmpClient, CmpClientConfig, RequestedValidity};

async fn client() -> CmpClient {
    CmpClient::new(CmpClientConfig::default())
        .await
        .expect("Client creation failed")
}

#[tokio::test]
async fn test_malformed_response_body() {
    let mock = MockCmpServer::start().await;
    mock.mock_raw(200, b"<html>not a PKIMessage</html>".to_vec())
        .await;

    let err = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_oversized_response_body() {
    let mock = MockCmpServer::start().await;
    mock.mock_raw(200, vec![0x30; MAX_RESPONSE_SIZE + 1]).await;

    let err = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_foreign_transaction_rejected() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().foreign_transaction())
        .await;

    let err = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_signature_reply_to_mac_request() {
    // Request is MAC-protected, response is signed
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().protected_by(CaProtection::issuing_ca()))
        .await;

    let err = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .unwrap_err();
    assert!(err.is_protocol(), "Expected protocol error, got: {:?}", err);
}

#[tokio::test]
async fn test_root_from_ca_pubs() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(
        CaResponder::accepting()
            .extra_certs(vec![certificate("issuing-ca.pem")])
            .ca_pubs(vec![certificate("root-ca.pem")]),
    )
    .await;

    let model = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .expect("initialization_request failed");

    assert_eq!(model.chain(), &[certificate("issuing-ca.pem")]);
    assert_eq!(model.trusted_roots(), &[certificate("root-ca.pem")]);
}

#[tokio::test]
async fn test_missing_chain_still_returns_leaf() {
    let mock = MockCmpServer::start().await;
    mock.mock_ca(CaResponder::accepting().extra_certs(Vec::new()))
        .await;

    let model = client()
        .await
        .initialization_request(&csr_model(), &mock.server(IAK), RequestedValidity::default())
        .await
        .expect("initialization_request failed");

    assert_eq!(model.entity_certificate(), &certificate("client-issued.pem"));
    assert!(model.chain().is_empty());
    assert!(model.trusted_roots().is_empty());
}
