// Copyright (c) 2019-2022 Intel Corporation
//
// SPDX-License-Identifier: Apache-2.0

//! In-process stand-ins for the KBS and the attestation service, used by
//! the integration tests of the workspace crates.
//!
//! Both servers bind an ephemeral port on 127.0.0.1 and run on the tokio
//! runtime of the calling test.

use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use hyper::{
    header,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde_json::{json, Value};

pub const SESSION_COOKIE: &str = "kbs-session-id";

/// Start a hyper server with `handler` on an ephemeral port and return its
/// base URL.
fn serve<S, F, Fut>(state: Arc<S>, handler: F) -> String
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Request<Body>) -> Fut + Send + Sync + Copy + 'static,
    Fut: std::future::Future<Output = Response<Body>> + Send + 'static,
{
    let address: SocketAddr = ([127, 0, 0, 1], 0).into();
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handler(state, req).await) }
            }))
        }
    });

    let server = Server::bind(&address).serve(make_svc);
    let url = format!("http://{}", server.local_addr());
    tokio::spawn(server);
    url
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build response")
}

fn error_info(status: StatusCode, detail: &str) -> Response<Body> {
    json_response(
        status,
        &json!({
            "type": "https://github.com/confidential-containers/kbs/errors/",
            "detail": detail,
        }),
    )
}

async fn read_json(req: Request<Body>) -> Option<Value> {
    let bytes = hyper::body::to_bytes(req.into_body()).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// How the stub KBS answers.
#[derive(Clone, Debug)]
pub struct KbsBehaviour {
    /// Nonce handed out by `/auth`. A per-session nonce is generated when
    /// unset.
    pub nonce: Option<String>,

    /// Answer `/auth` without a nonce.
    pub omit_nonce: bool,

    /// Body returned by a successful `/attest`.
    pub attest_response: Value,

    /// Status of `/attest` when the evidence is accepted.
    pub attest_status: u16,

    /// Resources served under `/kbs/v0/resource/`.
    pub resources: HashMap<String, Vec<u8>>,
}

impl Default for KbsBehaviour {
    fn default() -> Self {
        Self {
            nonce: None,
            omit_nonce: false,
            attest_response: json!({ "token": "tok-xyz" }),
            attest_status: 200,
            resources: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct KbsState {
    behaviour: KbsBehaviour,
    /// session id -> nonce issued in round 1
    sessions: HashMap<String, String>,
    next_session: u64,
    tokens: HashSet<String>,
    requests: Vec<String>,
    envelopes: Vec<Value>,
    authorizations: Vec<String>,
}

/// A KBS that enforces session affinity between `/auth` and `/attest`,
/// checks the echoed nonce and serves resources to bearer tokens it has
/// issued. Tokens are single use.
pub struct StubKbs {
    url: String,
    state: Arc<Mutex<KbsState>>,
}

impl StubKbs {
    pub async fn start(behaviour: KbsBehaviour) -> Self {
        let state = Arc::new(Mutex::new(KbsState {
            behaviour,
            ..Default::default()
        }));
        let url = serve(state.clone(), handle_kbs);
        Self { url, state }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every request received, as `"<METHOD> <path>"`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().expect("kbs state").requests.clone()
    }

    /// Bodies of every `/attest` request received.
    pub fn envelopes(&self) -> Vec<Value> {
        self.state.lock().expect("kbs state").envelopes.clone()
    }

    /// `Authorization` headers of every resource request received.
    pub fn authorizations(&self) -> Vec<String> {
        self.state.lock().expect("kbs state").authorizations.clone()
    }
}

fn session_cookie(req: &Request<Body>) -> Option<String> {
    let cookies = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|cookie| {
        let (name, value) = cookie.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

async fn handle_kbs(state: Arc<Mutex<KbsState>>, req: Request<Body>) -> Response<Body> {
    let path = req.uri().path().to_string();
    state
        .lock()
        .expect("kbs state")
        .requests
        .push(format!("{} {path}", req.method()));

    match (req.method(), path.as_str()) {
        (&Method::POST, "/kbs/v0/auth") => {
            let Some(request) = read_json(req).await else {
                return error_info(StatusCode::BAD_REQUEST, "malformed request");
            };
            if request.get("version").is_none() || request.get("tee").is_none() {
                return error_info(StatusCode::BAD_REQUEST, "malformed request");
            }

            let mut state = state.lock().expect("kbs state");
            state.next_session += 1;
            let session_id = format!("session-{}", state.next_session);
            let nonce = state
                .behaviour
                .nonce
                .clone()
                .unwrap_or_else(|| format!("nonce-{}", state.next_session));
            state.sessions.insert(session_id.clone(), nonce.clone());

            let body = match state.behaviour.omit_nonce {
                true => json!({ "extra-params": "" }),
                false => json!({ "nonce": nonce, "extra-params": "" }),
            };
            let mut response = json_response(StatusCode::OK, &body);
            response.headers_mut().insert(
                header::SET_COOKIE,
                format!("{SESSION_COOKIE}={session_id}; Path=/")
                    .parse()
                    .expect("cookie header"),
            );
            response
        }
        (&Method::POST, "/kbs/v0/attest") => {
            let session = session_cookie(&req);
            let Some(envelope) = read_json(req).await else {
                return error_info(StatusCode::BAD_REQUEST, "malformed evidence");
            };

            let mut state = state.lock().expect("kbs state");
            state.envelopes.push(envelope.clone());

            let Some(expected_nonce) = session.and_then(|id| state.sessions.remove(&id)) else {
                return error_info(StatusCode::UNAUTHORIZED, "no valid session");
            };
            let nonce = envelope.pointer("/runtime-data/nonce").and_then(Value::as_str);
            if nonce != Some(expected_nonce.as_str()) {
                return error_info(StatusCode::UNAUTHORIZED, "nonce mismatch");
            }

            let response = state.behaviour.attest_response.clone();
            for field in ["token", "session_id", "challenge"] {
                if let Some(token) = response.get(field).and_then(Value::as_str) {
                    state.tokens.insert(token.to_string());
                }
            }
            let status =
                StatusCode::from_u16(state.behaviour.attest_status).expect("valid status");
            json_response(status, &response)
        }
        (&Method::GET, resource) if resource.starts_with("/kbs/v0/resource/") => {
            let resource_path = &resource["/kbs/v0/resource/".len()..];
            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            let mut state = state.lock().expect("kbs state");
            state.authorizations.push(authorization.clone());

            let token = authorization.strip_prefix("Bearer ").unwrap_or_default();
            if !state.tokens.remove(token) {
                return error_info(StatusCode::UNAUTHORIZED, "invalid token");
            }

            match state.behaviour.resources.get(resource_path) {
                Some(content) => Response::new(Body::from(content.clone())),
                None => error_info(StatusCode::NOT_FOUND, "resource not found"),
            }
        }
        _ => error_info(StatusCode::NOT_FOUND, "unknown endpoint"),
    }
}

/// How the stub attestation service answers.
#[derive(Clone, Debug)]
pub struct VerifierBehaviour {
    pub healthy: bool,
    pub attest_status: u16,
    pub attest_response: Value,
}

impl VerifierBehaviour {
    pub fn accepting(claims: Value) -> Self {
        Self {
            healthy: true,
            attest_status: 200,
            attest_response: json!({ "tee_evidence": claims }),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            healthy: true,
            attest_status: 403,
            attest_response: json!({ "error": reason }),
        }
    }
}

#[derive(Default)]
struct VerifierState {
    behaviour: Option<VerifierBehaviour>,
    health_probes: usize,
    evidence: Vec<Value>,
}

pub struct StubVerifier {
    url: String,
    state: Arc<Mutex<VerifierState>>,
}

impl StubVerifier {
    pub async fn start(behaviour: VerifierBehaviour) -> Self {
        let state = Arc::new(Mutex::new(VerifierState {
            behaviour: Some(behaviour),
            ..Default::default()
        }));
        let url = serve(state.clone(), handle_verifier);
        Self { url, state }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn health_probes(&self) -> usize {
        self.state.lock().expect("verifier state").health_probes
    }

    /// `evidence` members of every `/attest` body received.
    pub fn evidence(&self) -> Vec<Value> {
        self.state.lock().expect("verifier state").evidence.clone()
    }
}

async fn handle_verifier(state: Arc<Mutex<VerifierState>>, req: Request<Body>) -> Response<Body> {
    let behaviour = state
        .lock()
        .expect("verifier state")
        .behaviour
        .clone()
        .expect("verifier behaviour");

    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => {
            state.lock().expect("verifier state").health_probes += 1;
            match behaviour.healthy {
                true => json_response(StatusCode::OK, &json!({ "status": "healthy" })),
                false => json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({ "status": "starting" }),
                ),
            }
        }
        (&Method::POST, "/attest") => {
            let body = read_json(req).await.unwrap_or_default();
            state
                .lock()
                .expect("verifier state")
                .evidence
                .push(body.get("evidence").cloned().unwrap_or_default());

            let status = StatusCode::from_u16(behaviour.attest_status).expect("valid status");
            json_response(status, &behaviour.attest_response)
        }
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "unknown endpoint" })),
    }
}
