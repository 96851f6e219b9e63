use std::time::Duration;

use serde_json::json;
use tourney_web::{Settings, WebServer};
use warp::hyper::{self, Body, Client as HyperClient, Request};

async fn post_json(
    client: &HyperClient<hyper::client::HttpConnector>,
    url: &str,
    body: serde_json::Value,
) -> (hyper::StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(hyper::Method::POST)
        .uri(url)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");
    let response = client.request(request).await.expect("issue request");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, value)
}

async fn get_json(
    client: &HyperClient<hyper::client::HttpConnector>,
    url: &str,
) -> (hyper::StatusCode, serde_json::Value) {
    let response = client
        .get(url.parse().expect("parse uri"))
        .await
        .expect("issue request");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes).expect("parse body");
    (status, value)
}

#[tokio::test]
async fn session_api_lifecycle() {
    let server = WebServer::new(Settings::for_tests()).expect("construct server");
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, body) = post_json(
        &client,
        &format!("http://{address}/start_session"),
        json!({
            "tournamentId": "t-http-1",
            "game_type": "tic_tac_toe",
            "playerAddresses": ["alice", "bob"]
        }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    let session_id = body["session_id"].as_str().expect("session id").to_string();

    // Idempotent: a second create for the tournament returns the same id
    let (_, body) = post_json(
        &client,
        &format!("http://{address}/start_session"),
        json!({
            "tournamentId": "t-http-1",
            "game_type": "tic_tac_toe",
            "playerAddresses": ["alice", "bob"]
        }),
    )
    .await;
    assert_eq!(body["session_id"].as_str(), Some(session_id.as_str()));

    let (status, body) = get_json(
        &client,
        &format!("http://{address}/get_tournament_session?tournamentId=t-http-1"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body["session_id"].as_str(), Some(session_id.as_str()));

    let (status, body) = get_json(
        &client,
        &format!("http://{address}/get_session_info?session_id={session_id}"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body["game_type"], "tic_tac_toe");
    assert_eq!(body["lifecycle"], "created");
    assert_eq!(body["players"], json!(["alice", "bob"]));

    let (status, _) = post_json(
        &client,
        &format!("http://{address}/start_tic_tac_toe_game"),
        json!({ "sessionId": session_id }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);

    let (status, body) = post_json(
        &client,
        &format!("http://{address}/tic_tac_toe_move"),
        json!({ "sessionId": session_id, "player": "alice", "cell": 4 }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body["game_type"], "tic_tac_toe");
    assert_eq!(body["grid"][4], "cross");

    let (status, body) = get_json(
        &client,
        &format!("http://{address}/tic_tac_toe_game_state?sessionId={session_id}"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body["lifecycle"], "running");
    assert_eq!(body["history"].as_array().map(Vec::len), Some(1));

    handle.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn error_mapping_follows_the_taxonomy() {
    let server = WebServer::new(Settings::for_tests()).expect("construct server");
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    // Unknown session -> 404 with a detail body
    let (status, body) = get_json(
        &client,
        &format!("http://{address}/chess_game_state?sessionId=nope"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().expect("detail").contains("nope"));

    // Unknown tournament -> 404
    let (status, _) = get_json(
        &client,
        &format!("http://{address}/get_tournament_session?tournamentId=ghost"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);

    let (_, body) = post_json(
        &client,
        &format!("http://{address}/start_session"),
        json!({
            "tournamentId": "t-http-2",
            "game_type": "connect_four",
            "playerAddresses": ["alice", "bob"]
        }),
    )
    .await;
    let session_id = body["session_id"].as_str().expect("session id").to_string();

    // Moves before the game starts are client errors
    let (status, _) = post_json(
        &client,
        &format!("http://{address}/connect_four_move"),
        json!({ "sessionId": session_id, "player": "alice", "column": 3 }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);

    post_json(
        &client,
        &format!("http://{address}/start_connect_four_game"),
        json!({ "sessionId": session_id }),
    )
    .await;

    // Out-of-turn -> 400 NotYourTurn
    let (status, body) = post_json(
        &client,
        &format!("http://{address}/connect_four_move"),
        json!({ "sessionId": session_id, "player": "bob", "column": 3 }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().expect("detail").contains("turn"));

    // Wrong engine endpoint for the session -> 400
    let (status, _) = post_json(
        &client,
        &format!("http://{address}/chess_move"),
        json!({ "sessionId": session_id, "player": "alice", "from": "e2", "to": "e4" }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);

    // Malformed payload -> 400
    let (status, _) = post_json(
        &client,
        &format!("http://{address}/connect_four_move"),
        json!({ "sessionId": session_id, "player": "alice", "column": "three" }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);

    // Unknown endpoint -> 404
    let (status, _) = post_json(
        &client,
        &format!("http://{address}/checkers_move"),
        json!({ "sessionId": session_id }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);

    handle.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn join_swaps_a_bot_seat_over_http() {
    let server = WebServer::new(Settings::for_tests()).expect("construct server");
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let (_, body) = post_json(
        &client,
        &format!("http://{address}/start_session"),
        json!({
            "tournamentId": "t-http-3",
            "game_type": "chess",
            "playerAddresses": ["alice"]
        }),
    )
    .await;
    let session_id = body["session_id"].as_str().expect("session id").to_string();

    let (status, _) = post_json(
        &client,
        &format!("http://{address}/join_chess_session?sessionId={session_id}&player=bob"),
        json!({}),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);

    let (_, body) = get_json(
        &client,
        &format!("http://{address}/get_session_info?session_id={session_id}"),
    )
    .await;
    assert_eq!(body["players"], json!(["alice", "bob"]));

    post_json(
        &client,
        &format!("http://{address}/start_chess_game"),
        json!({ "sessionId": session_id }),
    )
    .await;

    // Closed to joins once started
    let (status, body) = post_json(
        &client,
        &format!("http://{address}/join_chess_session?sessionId={session_id}&player=bob"),
        json!({}),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().expect("detail").contains("closed"));

    // The emoji side-channel takes posts from players and spectators alike
    let (status, _) = post_json(
        &client,
        &format!("http://{address}/chess_emoji"),
        json!({ "sessionId": session_id, "player": "lurker", "emoji": "🔥" }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);

    let (_, body) = get_json(
        &client,
        &format!("http://{address}/chess_game_state?sessionId={session_id}"),
    )
    .await;
    let log = body["emoji_log"].as_array().expect("emoji log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["spectator"], true);

    handle.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn notifier_feed_is_pollable_with_a_cursor() {
    let server = WebServer::new(Settings::for_tests()).expect("construct server");
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let (_, body) = post_json(
        &client,
        &format!("http://{address}/start_session"),
        json!({
            "tournamentId": "t-http-4",
            "game_type": "tic_tac_toe",
            "playerAddresses": ["alice", "bob"]
        }),
    )
    .await;
    let session_id = body["session_id"].as_str().expect("session id").to_string();
    post_json(
        &client,
        &format!("http://{address}/start_tic_tac_toe_game"),
        json!({ "sessionId": session_id }),
    )
    .await;

    let (status, body) = get_json(&client, &format!("http://{address}/events?since=0")).await;
    assert_eq!(status, hyper::StatusCode::OK);
    let events = body["events"].as_array().expect("events");
    let identifiers: Vec<&str> = events
        .iter()
        .map(|e| e["identifier"].as_str().expect("identifier"))
        .collect();
    assert!(identifiers.contains(&"tournament_created"));
    assert!(identifiers.contains(&"tournament_started"));
    assert!(identifiers.contains(&"game_started"));

    // The cursor skips already-seen records
    let latest = body["latest_seq"].as_u64().expect("latest");
    let (_, body) = get_json(
        &client,
        &format!("http://{address}/events?since={latest}"),
    )
    .await;
    assert_eq!(body["events"].as_array().map(Vec::len), Some(0));

    let (status, body) = get_json(&client, &format!("http://{address}/health")).await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body["status"], "ok");

    handle.shutdown().await.expect("clean shutdown");
}
