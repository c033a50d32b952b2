// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[tokio::test]
async fn roundtrip_through_duplex() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let value = json!({"token": "t", "kind": "ping"});
    let frame = encode(&value).unwrap();
    write_frame(&mut client, &frame).await.unwrap();

    let body = read_frame(&mut server).await.unwrap();
    let decoded: serde_json::Value = decode(&body).unwrap();
    assert_eq!(decoded, value);
}

#[tokio::test]
async fn frame_split_across_writes() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let frame = encode(&json!({"kind": "ping", "token": "abc"})).unwrap();
    let (head, tail) = frame.split_at(5);

    let head = head.to_vec();
    let tail = tail.to_vec();
    let writer = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        client.write_all(&head).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.write_all(&tail).await.unwrap();
        client
    });

    let body = read_frame(&mut server).await.unwrap();
    let decoded: serde_json::Value = decode(&body).unwrap();
    assert_eq!(decoded["kind"], "ping");
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn trailing_bytes_after_newline_are_not_part_of_the_frame() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    use tokio::io::AsyncWriteExt;
    client
        .write_all(b"{\"kind\":\"ping\",\"token\":\"t\"}\ngarbage after")
        .await
        .unwrap();

    let body = read_frame(&mut server).await.unwrap();
    assert_eq!(body, b"{\"kind\":\"ping\",\"token\":\"t\"}");
}

#[tokio::test]
async fn eof_before_newline_is_connection_closed() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    use tokio::io::AsyncWriteExt;
    client.write_all(b"{\"kind\":\"ping\"").await.unwrap();
    drop(client);

    let err = read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, FrameError::ConnectionClosed));
}

#[tokio::test]
async fn oversize_line_is_rejected() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);

    let writer = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        let mut client = client;
        let chunk = [b'a'; 64 * 1024];
        // Feed bytes without a newline until the reader gives up.
        loop {
            if client.write_all(&chunk).await.is_err() {
                break;
            }
        }
    });

    let err = read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, FrameError::Oversize { .. }));
    drop(server);
    let _ = writer.await;
}

#[test]
fn encode_rejects_oversize_values() {
    let huge = "x".repeat(MAX_FRAME_BYTES);
    let err = encode(&serde_json::json!({ "blob": huge })).unwrap_err();
    assert!(matches!(err, FrameError::Oversize { .. }));
}

#[test]
fn decode_rejects_invalid_json() {
    let err = decode::<serde_json::Value>(b"{nope").unwrap_err();
    assert!(matches!(err, FrameError::InvalidJson(_)));
}

#[tokio::test]
async fn read_message_times_out() {
    let (_client, mut server) = tokio::io::duplex(64);
    let err = read_message::<_, serde_json::Value>(
        &mut server,
        std::time::Duration::from_millis(50),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FrameError::Timeout));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    // encode → read_frame → decode is the identity for any JSON-safe map
    // payload under the frame cap.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn frame_roundtrip(entries in proptest::collection::btree_map("[a-z]{1,8}", "[ -~]{0,64}", 0..8)) {
            let value = serde_json::to_value(&entries).unwrap();
            let frame = encode(&value).unwrap();
            prop_assert_eq!(frame.last(), Some(&b'\n'));

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let decoded: serde_json::Value = runtime.block_on(async {
                let (mut client, mut server) = tokio::io::duplex(MAX_FRAME_BYTES + 16);
                write_frame(&mut client, &frame).await.unwrap();
                let body = read_frame(&mut server).await.unwrap();
                decode(&body).unwrap()
            });
            prop_assert_eq!(decoded, value);
        }
    }
}
