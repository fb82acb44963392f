//! Display strings of the public error types.

use std::io;

use mgmtframe::{
    ClientError,
    ManagementError,
    ServerError,
    protocol::Command,
    registry::RegistryError,
};
use rstest::rstest;

#[rstest]
#[case(ManagementError::UnknownCommand { code: 0x7F }, "unknown command code 0x7f")]
#[case(
    ManagementError::UnknownHandler(0x0B),
    "no handler registered for identifier 0x0b"
)]
#[case(
    ManagementError::Operation {
        command: Command::GetDomain,
        source: Box::new(ManagementError::UnknownHandler(0x01)),
    },
    "get_domain failed: no handler registered for identifier 0x01"
)]
fn management_error_display(#[case] err: ManagementError, #[case] expected: &str) {
    assert_eq!(err.to_string(), expected);
}

#[rstest]
#[case(ClientError::Rejected("nope".into()), "request rejected by server: nope")]
#[case(
    ClientError::UnexpectedResponse { expected: 0x11, found: 0xEE },
    "unexpected response code 0xee, expected 0x11"
)]
#[case(ClientError::TrailingBytes(3), "3 unexpected bytes after the response")]
#[case(ClientError::Disconnected, "connection closed by peer")]
fn client_error_display(#[case] err: ClientError, #[case] expected: &str) {
    assert_eq!(err.to_string(), expected);
}

#[test]
fn server_bind_error_display() {
    let err = ServerError::Bind(io::Error::new(io::ErrorKind::AddrInUse, "in use"));
    assert_eq!(err.to_string(), "bind error: in use");
}

#[rstest]
#[case(RegistryError::DuplicateCommand(0x10), "command code 0x10 was already registered")]
#[case(
    RegistryError::DuplicateHandler(0x0A),
    "handler identifier 0x0a was already registered"
)]
fn registry_error_display(#[case] err: RegistryError, #[case] expected: &str) {
    assert_eq!(err.to_string(), expected);
}
