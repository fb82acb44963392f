//! Unit tests for the management client encoders, decoders and runtime.

use std::num::NonZeroUsize;

use bytes::{BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use rstest::rstest;
use tokio_util::codec::Framed;

use super::*;
use crate::{
    chunk::{CHUNK_END, CHUNK_START},
    codec::{WireError, WireWriter},
    framing,
    marshal::BincodeMarshaller,
    model::{DomainModel, DomainUpdate},
    protocol::{
        ADD_DEPLOYMENT_CONTENT_REQUEST,
        APPLY_UPDATE_RESPONSE,
        DOMAIN_CONTROLLER_CLIENT_REQUEST,
        GET_DOMAIN_REQUEST,
        GET_DOMAIN_RESPONSE,
        REQUEST_OPERATION,
        RESPONSE_FAILED,
        param,
    },
};

fn error_frame(message: &str) -> BytesMut {
    let mut out = WireWriter::start(&BincodeMarshaller);
    out.write_u8(RESPONSE_FAILED);
    out.write_utf(message).expect("short message");
    out.into_bytes()
}

fn domain_frame(model: &DomainModel) -> BytesMut {
    let mut out = WireWriter::start(&BincodeMarshaller);
    out.write_u8(GET_DOMAIN_RESPONSE);
    out.write_u8(param::DOMAIN_MODEL);
    out.write_object(model).expect("marshal model");
    out.into_bytes()
}

#[test]
fn get_domain_request_is_envelope_only() {
    let frame = request::get_domain(&BincodeMarshaller);
    assert_eq!(
        &frame[..],
        &[
            DOMAIN_CONTROLLER_CLIENT_REQUEST,
            REQUEST_OPERATION,
            GET_DOMAIN_REQUEST
        ]
    );
    assert_eq!(frame.len(), request::ENVELOPE_LEN);
}

#[test]
fn content_upload_is_split_into_chunks() {
    let content = vec![7u8; 4096 + 4096 + 17];
    let chunk_size = NonZeroUsize::new(4096).expect("non-zero");
    let frame = request::add_deployment_content(
        &BincodeMarshaller,
        "app.war",
        "app.war",
        &content,
        chunk_size,
    )
    .expect("encode upload");

    assert_eq!(frame[2], ADD_DEPLOYMENT_CONTENT_REQUEST);
    let markers = frame.iter().filter(|b| **b == CHUNK_START).count();
    assert_eq!(markers, 3);
    assert_eq!(frame.last(), Some(&CHUNK_END));
}

#[tokio::test]
async fn decodes_domain_model() {
    let model = DomainModel {
        payload: b"domain".to_vec(),
    };
    let decoded = response::domain_model(&domain_frame(&model), &BincodeMarshaller)
        .await
        .expect("decode model");
    assert_eq!(decoded, model);
}

#[tokio::test]
async fn error_frame_is_rejected() {
    let frame = error_frame("unknown command code 0x7f");
    let err = response::domain_model(&frame, &BincodeMarshaller)
        .await
        .expect_err("error frame");
    assert!(
        matches!(err, ClientError::Rejected(ref message) if message == "unknown command code 0x7f")
    );
}

#[rstest]
#[case(APPLY_UPDATE_RESPONSE)]
#[case(0x00)]
#[tokio::test]
async fn foreign_response_code_is_reported(#[case] code: u8) {
    let err = response::domain_model(&[code], &BincodeMarshaller)
        .await
        .expect_err("wrong response code");
    assert!(matches!(
        err,
        ClientError::UnexpectedResponse {
            expected: GET_DOMAIN_RESPONSE,
            found,
        } if found == code
    ));
}

#[tokio::test]
async fn trailing_bytes_are_reported() {
    let mut frame = domain_frame(&DomainModel::default());
    frame.put_u8(0xFF);
    let err = response::domain_model(&frame, &BincodeMarshaller)
        .await
        .expect_err("trailing byte");
    assert!(matches!(err, ClientError::TrailingBytes(1)));
}

#[tokio::test]
async fn wrong_field_tag_is_a_protocol_violation() {
    let frame = [GET_DOMAIN_RESPONSE, param::DEPLOYMENT_HASH];
    let err = response::domain_model(&frame, &BincodeMarshaller)
        .await
        .expect_err("wrong tag");
    assert!(matches!(
        err,
        ClientError::Wire(WireError::ProtocolViolation {
            expected: param::DOMAIN_MODEL,
            found: param::DEPLOYMENT_HASH,
        })
    ));
}

#[tokio::test]
async fn client_round_trips_frames_over_a_stream() {
    let (client_io, server_io) = tokio::io::duplex(1024);
    let server = tokio::spawn(async move {
        let mut framed = Framed::new(server_io, framing::codec(1024));
        let request = framed
            .next()
            .await
            .expect("request frame")
            .expect("valid frame");
        assert_eq!(request[2], GET_DOMAIN_REQUEST);
        let model = DomainModel {
            payload: vec![1, 2, 3],
        };
        framed
            .send(domain_frame(&model).freeze())
            .await
            .expect("send response");
    });

    let mut client = ManagementClient::new(client_io).max_frame_length(1024);
    let model = client.get_domain().await.expect("domain model");
    assert_eq!(model.payload, vec![1, 2, 3]);
    server.await.expect("join server");
}

#[tokio::test]
async fn closed_connection_reports_disconnect() {
    let (client_io, server_io) = tokio::io::duplex(1024);
    drop(server_io);
    let mut client = ManagementClient::new(client_io);
    let err = client
        .apply_update(&DomainUpdate::new("u", vec![1]))
        .await
        .expect_err("peer gone");
    assert!(matches!(err, ClientError::Io(_) | ClientError::Disconnected));
}
