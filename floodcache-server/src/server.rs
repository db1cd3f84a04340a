use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use floodcache_core::{
    ApiResponse, ConnectRequest, ConnectResponse, FloodError, ObtainOperation,
    ObtainOperationOutcome, PartitionOperation, PartitionRequest, Peer, QueryOperation,
    QueryRequest, QueryResponse, Result,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(peer: Arc<Peer>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/internal/files/:filename", get(get_file))
        .route("/internal/connect", post(connect))
        .route("/internal/query", post(query))
        .route("/internal/metadata/:filename", get(get_metadata))
        .route("/internal/partition", post(receive_partition))
        .layer(TraceLayer::new_for_http())
        .with_state(peer)
}

pub async fn run_server<F>(peer: Arc<Peer>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(peer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Peer service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

fn error_response(error: FloodError) -> Response {
    let status = match &error {
        FloodError::FileNotFound(_) => StatusCode::NOT_FOUND,
        FloodError::StaleCopy(_) => StatusCode::CONFLICT,
        FloodError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FloodError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {}", error);
    }

    (status, Json(ApiResponse::<()>::err(error.to_string()))).into_response()
}

async fn health_handler(State(peer): State<Arc<Peer>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "peer_id": peer.id(),
        "mode": peer.mode(),
        "connected_neighbors": peer.neighbors().connected().await,
        "stats": peer.stats().snapshot(),
    });

    (StatusCode::OK, Json(response))
}

async fn get_file(State(peer): State<Arc<Peer>>, Path(filename): Path<String>) -> Response {
    match ObtainOperation::new(peer).run(&filename).await {
        Ok(ObtainOperationOutcome::Found(data)) => (StatusCode::OK, data).into_response(),
        Ok(ObtainOperationOutcome::Vanished) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn connect(State(peer): State<Arc<Peer>>, Json(request): Json<ConnectRequest>) -> Response {
    let mode = peer.notify_connection(request.peer_id).await;
    (StatusCode::OK, Json(ApiResponse::ok(ConnectResponse { mode }))).into_response()
}

async fn query(State(peer): State<Arc<Peer>>, Json(request): Json<QueryRequest>) -> Response {
    match QueryOperation::new(peer).run(request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ApiResponse::ok(QueryResponse {
                sources: result.sources,
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_metadata(State(peer): State<Arc<Peer>>, Path(filename): Path<String>) -> Response {
    match peer.check_metadata(&filename).await {
        Ok(metadata) => (StatusCode::OK, Json(ApiResponse::ok(metadata))).into_response(),
        Err(error) => error_response(error),
    }
}

async fn receive_partition(
    State(peer): State<Arc<Peer>>,
    Json(request): Json<PartitionRequest>,
) -> Response {
    let invalidated = PartitionOperation::new(peer)
        .receive_neighbors(&request.neighbors)
        .await;
    (StatusCode::OK, Json(ApiResponse::ok(invalidated))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, header};
    use floodcache_core::{
        ConsistencyMode, FileMetadata, HttpTransport, PeerConfig, PeerTransport, QueryKind,
        Validity,
    };
    use tower::ServiceExt;

    async fn test_peer(temp_dir: &tempfile::TempDir, mode: ConsistencyMode) -> Arc<Peer> {
        let config = PeerConfig::new(
            1,
            vec![2],
            mode,
            temp_dir.path().join("files"),
            temp_dir.path().join("downloads"),
        );
        std::fs::create_dir_all(&config.files_dir).unwrap();
        std::fs::write(config.files_dir.join("a.txt"), b"hello").unwrap();

        let transport = Arc::new(HttpTransport::new("127.0.0.1", 1).unwrap());
        Peer::open(config, transport).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_file_statuses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = test_peer(&temp_dir, ConsistencyMode::Push).await;
        peer.entries().register_orphan("old.txt").await.unwrap();
        let app = router(peer.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/internal/files/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");

        let response = app
            .clone()
            .oneshot(Request::get("/internal/files/missing.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);

        let response = app
            .clone()
            .oneshot(Request::get("/internal/files/old.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        std::fs::remove_file(temp_dir.path().join("files").join("a.txt")).unwrap();
        let response = app
            .oneshot(Request::get("/internal/files/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!peer.entries().is_master("a.txt").await);
    }

    #[tokio::test]
    async fn test_connect_returns_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = test_peer(&temp_dir, ConsistencyMode::Pull).await;

        let response = router(peer.clone())
            .oneshot(json_post(
                "/internal/connect",
                serde_json::json!({ "peer_id": 2 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["mode"], "pull");
        assert!(peer.neighbors().is_connected(2).await);
    }

    #[tokio::test]
    async fn test_query_reports_local_copy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = test_peer(&temp_dir, ConsistencyMode::Push).await;
        let request = QueryRequest {
            sender_id: 2,
            filename: "a.txt".to_string(),
            ttl: 1,
            requesting_id: 2,
            kind: QueryKind::Search,
        };

        let response = router(peer)
            .oneshot(json_post(
                "/internal/query",
                serde_json::to_value(&request).unwrap(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["sources"], serde_json::json!([1]));
    }

    #[tokio::test]
    async fn test_metadata_and_partition() {
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = test_peer(&temp_dir, ConsistencyMode::Push).await;
        let metadata = FileMetadata {
            version: 4,
            master_id: 9,
            ttr_ms: 6000,
        };
        peer.entries().record_fetch("b.txt", &metadata).await.unwrap();
        let app = router(peer.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/internal/metadata/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["master_id"], 1);
        assert_eq!(json["data"]["version"], 0);

        let response = app
            .clone()
            .oneshot(Request::get("/internal/metadata/zzz.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(json_post(
                "/internal/partition",
                serde_json::json!({ "neighbors": [2, 9] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(peer.entries().has_file("b.txt").await, Validity::Invalid);
    }

    #[tokio::test]
    async fn test_http_transport_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = test_peer(&temp_dir, ConsistencyMode::Push).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = router(peer);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Peer 0 sits exactly on the base port.
        let transport = HttpTransport::new("127.0.0.1", port).unwrap();
        let client: &dyn PeerTransport = &transport;

        assert_eq!(
            client.notify_connection(0, 2).await.unwrap(),
            ConsistencyMode::Push
        );
        assert_eq!(
            client.obtain(0, "a.txt").await.unwrap().unwrap(),
            Bytes::from_static(b"hello")
        );
        assert!(matches!(
            client.obtain(0, "nope.txt").await,
            Err(FloodError::FileNotFound(_))
        ));
        assert_eq!(client.check_metadata(0, "a.txt").await.unwrap().master_id, 1);
        client
            .receive_neighbors(0, [3].into_iter().collect())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_transport_keeps_reserved_characters_in_filenames() {
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = test_peer(&temp_dir, ConsistencyMode::Push).await;
        let files_dir = temp_dir.path().join("files");
        std::fs::write(files_dir.join("a"), b"AAA").unwrap();
        std::fs::write(files_dir.join("a?b"), b"BBB").unwrap();
        std::fs::write(files_dir.join("a#b"), b"CCC").unwrap();
        std::fs::write(files_dir.join("100%"), b"DDD").unwrap();
        for name in ["a", "a?b", "a#b", "100%"] {
            peer.entries().register_master(name).await;
        }
        peer.entries().increment_version("a#b").await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = router(peer);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let transport = HttpTransport::new("127.0.0.1", port).unwrap();
        let client: &dyn PeerTransport = &transport;

        assert_eq!(
            client.obtain(0, "a?b").await.unwrap().unwrap(),
            Bytes::from_static(b"BBB")
        );
        assert_eq!(
            client.obtain(0, "a#b").await.unwrap().unwrap(),
            Bytes::from_static(b"CCC")
        );
        assert_eq!(
            client.obtain(0, "100%").await.unwrap().unwrap(),
            Bytes::from_static(b"DDD")
        );
        assert_eq!(client.check_metadata(0, "a#b").await.unwrap().version, 1);
        assert_eq!(client.check_metadata(0, "a").await.unwrap().version, 0);
        assert!(matches!(
            client.check_metadata(0, "a?c").await,
            Err(FloodError::FileNotFound(_))
        ));
    }
}
