use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pdfqa_rag::{
    ExtractiveGenerator, HashEmbeddingProvider, InMemoryVectorIndex, RagConfig, RagPipeline,
};
use pdfqa_server::{AppState, app_router, protocol::ErrorResponse};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

fn test_state() -> AppState {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().chunk_size(20).chunk_overlap(5).build().unwrap())
        .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
        .vector_index(Arc::new(InMemoryVectorIndex::new()))
        .generator(Arc::new(ExtractiveGenerator))
        .build()
        .expect("pipeline");
    AppState::new(Arc::new(pipeline))
}

async fn spawn_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

fn single_page_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id =
        doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode content")));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

fn file_form(filename: &str, bytes: Vec<u8>) -> Form {
    let part = Part::bytes(bytes).file_name(filename.to_string());
    Form::new().part("file", part)
}

async fn error_kind(response: reqwest::Response) -> String {
    let body: ErrorResponse = response.json().await.expect("error json");
    assert!(!body.detail.is_empty());
    body.error
}

#[tokio::test]
async fn root_and_health_respond() {
    let (base, handle) = spawn_server(test_state()).await;
    let client = reqwest::Client::new();

    let root: Value = client.get(format!("{}/", base)).send().await.unwrap().json().await.unwrap();
    assert!(root.get("message").and_then(Value::as_str).is_some());

    let response = client.get(format!("{}/health", base)).send().await.expect("health response");
    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = response.json().await.expect("health json");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database_connected"], true);
    assert_eq!(health["total_chunks"], 0);
    assert!(health["timestamp"].is_string());

    handle.abort();
}

#[tokio::test]
async fn asking_before_any_upload_is_a_client_error() {
    let (base, handle) = spawn_server(test_state()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/ask", base))
        .json(&json!({ "question": "What is X?" }))
        .send()
        .await
        .expect("ask response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(response).await, "no_document");

    handle.abort();
}

#[tokio::test]
async fn invalid_questions_are_rejected() {
    let (base, handle) = spawn_server(test_state()).await;
    let client = reqwest::Client::new();

    for body in [
        json!({ "question": "   " }),
        json!({ "question": "x".repeat(501) }),
        json!({ "question": "What is X?", "n_results": 0 }),
        json!({ "question": "What is X?", "n_results": 11 }),
        json!({ "n_results": 2 }),
    ] {
        let response =
            client.post(format!("{}/ask", base)).json(&body).send().await.expect("ask response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(error_kind(response).await, "bad_request");
    }

    handle.abort();
}

#[tokio::test]
async fn non_pdf_uploads_are_rejected() {
    let (base, handle) = spawn_server(test_state()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload-pdf", base))
        .multipart(file_form("notes.txt", b"plain text".to_vec()))
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(response).await, "bad_request");

    handle.abort();
}

#[tokio::test]
async fn corrupt_pdf_is_an_extraction_error() {
    let (base, handle) = spawn_server(test_state()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload-pdf", base))
        .multipart(file_form("broken.pdf", b"%PDF-1.4 not really a pdf".to_vec()))
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(response).await, "extraction_error");

    handle.abort();
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let state = test_state().with_max_upload_bytes(1024);
    let (base, handle) = spawn_server(state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload-pdf", base))
        .multipart(file_form("large.pdf", vec![b'a'; 4096]))
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_kind(response).await, "payload_too_large");

    handle.abort();
}

#[tokio::test]
async fn upload_then_ask_returns_grounded_answer() {
    let state = test_state();
    let pipeline = Arc::clone(&state.pipeline);
    let (base, handle) = spawn_server(state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/upload-pdf", base))
        .multipart(file_form("greek.pdf", single_page_pdf("Alpha beta gamma. Delta epsilon zeta.")))
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), StatusCode::OK);
    let upload: Value = response.json().await.expect("upload json");
    assert_eq!(upload["filename"], "greek.pdf");
    let chunks_created = upload["chunks_created"].as_u64().expect("chunks_created");
    assert!(chunks_created >= 1);
    assert_eq!(pipeline.count().await.unwrap() as u64, chunks_created);

    let response = client
        .post(format!("{}/ask", base))
        .json(&json!({ "question": "  alpha  ", "n_results": 1 }))
        .send()
        .await
        .expect("ask response");
    assert_eq!(response.status(), StatusCode::OK);
    let answer: Value = response.json().await.expect("answer json");
    assert_eq!(answer["question"], "alpha");

    let chunks = answer["retrieved_chunks"].as_array().expect("chunks");
    let scores = answer["similarity_scores"].as_array().expect("scores");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks.len(), scores.len());
    assert!(chunks[0].as_str().unwrap().contains("Alpha"));
    assert!(answer["answer"].as_str().unwrap().contains("Alpha"));
    assert!(answer["processing_time_ms"].as_f64().is_some());

    handle.abort();
}

#[tokio::test]
async fn stats_and_clear_track_the_index() {
    let state = test_state();
    state.pipeline.ingest_text("Alpha beta gamma. Delta epsilon zeta.").await.unwrap();
    let (base, handle) = spawn_server(state).await;
    let client = reqwest::Client::new();

    let stats: Value = client
        .get(format!("{}/database/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["collection_name"], "pdf_chunks");
    assert_eq!(stats["total_chunks"], 3);
    assert_eq!(stats["database_path"], "in-memory");
    assert_eq!(stats["embedding_model"], "feature-hashing");

    let cleared: Value = client
        .delete(format!("{}/database/clear", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["chunks_removed"], 3);
    assert!(cleared["message"].as_str().unwrap().contains('3'));

    let again: Value = client
        .delete(format!("{}/database/clear", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["message"], "Database was already empty");

    let response = client
        .post(format!("{}/ask", base))
        .json(&json!({ "question": "Alpha?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    handle.abort();
}
