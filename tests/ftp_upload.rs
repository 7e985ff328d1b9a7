//! Upload-flow tests against a scripted in-process FTP server.
//!
//! The server speaks just enough of the control and data protocol to let
//! the client run its real login, directory, store, and size sequences,
//! and records what it saw so the tests can assert on the wire behavior.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use bambulink::error::Error;
use bambulink::profile::ConnectionProfile;
use bambulink::transfer::FileTransferClient;

/// Which stages of the session the scripted server refuses.
#[derive(Debug, Clone, Copy, Default)]
struct Script {
    reject_anonymous: bool,
    reject_all_logins: bool,
    reject_cwd: bool,
    reject_mkd: bool,
    misreport_size: bool,
}

/// What the server observed over one session.
#[derive(Debug)]
struct Observed {
    logins: Vec<(String, String)>,
    verbs: Vec<String>,
    stored: Vec<u8>,
}

fn spawn_server(script: Script) -> (String, thread::JoinHandle<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    let handle = thread::spawn(move || serve(listener, script));
    (address, handle)
}

fn reply(ctrl: &mut TcpStream, line: &str) {
    write!(ctrl, "{line}\r\n").expect("write reply");
    ctrl.flush().expect("flush reply");
}

fn serve(listener: TcpListener, script: Script) -> Observed {
    let (stream, _) = listener.accept().expect("accept control connection");
    let mut reader = BufReader::new(stream.try_clone().expect("clone control stream"));
    let mut ctrl = stream;

    let mut observed = Observed {
        logins: Vec::new(),
        verbs: Vec::new(),
        stored: Vec::new(),
    };
    let mut pending_user = String::new();
    let mut data_listener: Option<TcpListener> = None;

    reply(&mut ctrl, "220 mock printer ready");

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };
        observed.verbs.push(verb.clone());

        match verb.as_str() {
            "USER" => {
                pending_user = arg;
                reply(&mut ctrl, "331 password required");
            }
            "PASS" => {
                observed.logins.push((pending_user.clone(), arg));
                let reject = script.reject_all_logins
                    || (script.reject_anonymous && pending_user.eq_ignore_ascii_case("anonymous"));
                if reject {
                    reply(&mut ctrl, "530 not logged in");
                } else {
                    reply(&mut ctrl, "230 logged in");
                }
            }
            "CWD" => {
                if script.reject_cwd {
                    reply(&mut ctrl, "550 no such directory");
                } else {
                    reply(&mut ctrl, "250 directory changed");
                }
            }
            "MKD" => {
                if script.reject_mkd {
                    reply(&mut ctrl, "550 permission denied");
                } else {
                    reply(&mut ctrl, "257 directory created");
                }
            }
            "TYPE" => reply(&mut ctrl, "200 type set"),
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").expect("bind data listener");
                let port = listener.local_addr().unwrap().port();
                data_listener = Some(listener);
                reply(
                    &mut ctrl,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port >> 8,
                        port & 0xff
                    ),
                );
            }
            "EPSV" => {
                let listener = TcpListener::bind("127.0.0.1:0").expect("bind data listener");
                let port = listener.local_addr().unwrap().port();
                data_listener = Some(listener);
                reply(&mut ctrl, &format!("229 Entering Extended Passive Mode (|||{port}|)"));
            }
            "STOR" => match data_listener.take() {
                Some(listener) => {
                    reply(&mut ctrl, "150 ok to send data");
                    let (mut data, _) = listener.accept().expect("accept data connection");
                    data.read_to_end(&mut observed.stored).expect("read data");
                    drop(data);
                    reply(&mut ctrl, "226 transfer complete");
                }
                None => reply(&mut ctrl, "425 use PASV first"),
            },
            "SIZE" => {
                let len = if script.misreport_size {
                    observed.stored.len() + 7
                } else {
                    observed.stored.len()
                };
                reply(&mut ctrl, &format!("213 {len}"));
            }
            "QUIT" => {
                reply(&mut ctrl, "221 goodbye");
                break;
            }
            _ => reply(&mut ctrl, "502 command not implemented"),
        }
    }

    observed
}

fn profile(address: &str) -> ConnectionProfile {
    ConnectionProfile {
        name: "mock".to_string(),
        address: address.to_string(),
        access_code: "87654321".to_string(),
        serial: Some("00M00A000000001".to_string()),
    }
}

fn gcode_fixture(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create fixture");
    file.write_all(content).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}

#[test]
fn upload_succeeds_with_anonymous_login() {
    let (address, server) = spawn_server(Script::default());
    let fixture = gcode_fixture(b"G28\nG1 X10 Y10\n");

    let result = FileTransferClient::new()
        .upload(
            &profile(&address),
            fixture.path(),
            Some("benchy.gcode"),
            None,
        )
        .expect("upload");

    assert!(result.success);
    assert_eq!(result.remote_path.as_deref(), Some("/upload/benchy.gcode"));
    assert_eq!(result.error, None);

    let observed = server.join().expect("server thread");
    assert_eq!(observed.stored, b"G28\nG1 X10 Y10\n");
    assert_eq!(observed.logins, vec![("anonymous".to_string(), "anonymous".to_string())]);
}

#[test]
fn rejected_anonymous_login_falls_back_to_the_access_code() {
    let (address, server) = spawn_server(Script {
        reject_anonymous: true,
        ..Script::default()
    });
    let fixture = gcode_fixture(b"G28\n");

    let result = FileTransferClient::new()
        .upload(&profile(&address), fixture.path(), Some("plate.gcode"), None)
        .expect("upload");
    assert!(result.success);

    let observed = server.join().expect("server thread");
    assert_eq!(
        observed.logins,
        vec![
            ("anonymous".to_string(), "anonymous".to_string()),
            ("bblp".to_string(), "87654321".to_string()),
        ]
    );
    assert_eq!(observed.stored, b"G28\n");
}

#[test]
fn rejecting_both_logins_is_an_authentication_error_and_no_transfer_runs() {
    let (address, server) = spawn_server(Script {
        reject_all_logins: true,
        ..Script::default()
    });
    let fixture = gcode_fixture(b"G28\n");

    let err = FileTransferClient::new()
        .upload(&profile(&address), fixture.path(), Some("plate.gcode"), None)
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));

    let observed = server.join().expect("server thread");
    assert_eq!(observed.logins.len(), 2);
    assert!(observed.stored.is_empty());
    assert!(!observed.verbs.iter().any(|verb| verb == "STOR"));
}

#[test]
fn refused_directory_degrades_into_the_current_directory() {
    let (address, server) = spawn_server(Script {
        reject_cwd: true,
        reject_mkd: true,
        ..Script::default()
    });
    let fixture = gcode_fixture(b"G1 Z5\n");

    let result = FileTransferClient::new()
        .upload(&profile(&address), fixture.path(), Some("plate.gcode"), None)
        .expect("upload");

    assert!(result.success);
    assert!(result.message.contains("current directory"));
    assert_eq!(result.remote_path.as_deref(), Some("plate.gcode"));

    let observed = server.join().expect("server thread");
    assert!(observed.verbs.iter().any(|verb| verb == "MKD"));
    assert_eq!(observed.stored, b"G1 Z5\n");
}

#[test]
fn size_mismatch_is_advisory_not_fatal() {
    let (address, server) = spawn_server(Script {
        misreport_size: true,
        ..Script::default()
    });
    let fixture = gcode_fixture(b"G28\nM104 S200\n");

    let result = FileTransferClient::new()
        .upload(&profile(&address), fixture.path(), Some("plate.gcode"), None)
        .expect("upload");

    assert!(result.success);
    assert!(result.message.contains("remote reports"));

    let observed = server.join().expect("server thread");
    assert_eq!(observed.stored, b"G28\nM104 S200\n");
}

#[test]
fn test_connection_reports_reachable_printer() {
    let (address, server) = spawn_server(Script::default());
    assert!(FileTransferClient::new().test_connection(&profile(&address)));
    let observed = server.join().expect("server thread");
    assert!(observed.verbs.iter().any(|verb| verb == "QUIT"));
}

#[test]
fn test_connection_reports_rejected_credentials() {
    let (address, server) = spawn_server(Script {
        reject_all_logins: true,
        ..Script::default()
    });
    assert!(!FileTransferClient::new().test_connection(&profile(&address)));
    server.join().expect("server thread");
}
