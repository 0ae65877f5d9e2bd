mod common;

use vmfs_client::*;

fn todo_file() -> &'static str {
    "pidir/todo.txt"
}

#[test]
fn test_canonical_workload_legacy() {
    let (client, agent) = common::client(ResponseMode::Legacy, DEFAULT_READ_CAPACITY);
    let mut sequencer = Sequencer::new(client);

    let reports = sequencer
        .run(&Script::canonical(&CanonicalScript::default()))
        .unwrap();
    assert_eq!(sequencer.state(), SequencerState::Completed);
    assert_eq!(reports.len(), 5);

    let read = reports[2].response.content().expect("read reply");
    assert_eq!(read.bytes(), TODO_CONTENT.as_bytes());
    assert_eq!(read.capacity(), DEFAULT_READ_CAPACITY);
    assert!(read.padded()[TODO_CONTENT.len()..].iter().all(|b| *b == 0));
    assert_eq!(read.text(), TODO_CONTENT);

    for index in [0, 1, 3, 4] {
        assert_eq!(reports[index].response, Response::Unacknowledged);
    }

    sequencer.into_client().shutdown().unwrap();
    let state = agent.join().unwrap();
    assert!(state.dirs.is_empty());
    assert!(state.files.is_empty());
    assert_eq!(state.received.len(), 5);
}

#[test]
fn test_canonical_workload_framed() {
    let (client, agent) = common::client(ResponseMode::Framed, DEFAULT_READ_CAPACITY);
    let mut sequencer = Sequencer::new(client);

    let reports = sequencer
        .run(&Script::canonical(&CanonicalScript::default()))
        .unwrap();
    let operations: Vec<_> = reports.iter().map(|r| r.operation).collect();
    assert_eq!(operations, ["create_dir", "write", "read", "copy", "remove_dir_all"]);
    assert_eq!(reports[0].response, Response::Ack);
    assert_eq!(
        reports[2].response.content().map(Received::bytes),
        Some(TODO_CONTENT.as_bytes())
    );

    drop(sequencer);
    let state = agent.join().unwrap();
    assert!(state.dirs.is_empty());
    assert!(state.files.is_empty());
}

#[test]
fn test_read_output_feeds_later_write() {
    let (client, agent) = common::client(ResponseMode::Framed, DEFAULT_READ_CAPACITY);
    let script = Script::new(vec![
        Operation::create_dir("pidir").into(),
        Operation::write(todo_file(), TODO_CONTENT).into(),
        Operation::read(todo_file()).into(),
        Step::WriteFromRead {
            path: "pidir/done.txt".to_string(),
            read_step: 2,
        },
    ])
    .unwrap();

    let mut sequencer = Sequencer::new(client);
    sequencer.run(&script).unwrap();
    drop(sequencer);

    let state = agent.join().unwrap();
    assert_eq!(state.files["pidir/done.txt"], TODO_CONTENT.as_bytes());
    assert_eq!(
        state.received[3],
        Operation::write("pidir/done.txt", TODO_CONTENT)
    );
}

#[test]
fn test_full_canonical_variant_framed() {
    let (client, agent) = common::client(ResponseMode::Framed, DEFAULT_READ_CAPACITY);
    let script = Script::canonical(&CanonicalScript {
        write_back: Some("done.txt".to_string()),
        second_dir: Some("pidir2".to_string()),
        ..CanonicalScript::default()
    });

    let mut sequencer = Sequencer::new(client);
    let reports = sequencer.run(&script).unwrap();
    assert_eq!(reports.len(), 8);
    drop(sequencer);

    let state = agent.join().unwrap();
    assert!(state.dirs.is_empty());
    assert!(state.files.is_empty());
}

#[test]
fn test_failed_step_aborts_remaining_steps() {
    let (client, agent) = common::client(ResponseMode::Framed, DEFAULT_READ_CAPACITY);
    let script = Script::new(vec![
        Operation::create_dir("pidir").into(),
        Operation::read("pidir/missing.txt").into(),
        Operation::remove_dir_all("pidir").into(),
    ])
    .unwrap();

    let mut sequencer = Sequencer::new(client);
    let err = sequencer.run(&script).unwrap_err();
    assert_eq!(err.step(), Some(1));
    assert!(matches!(
        err,
        SequenceError::Step {
            index: 1,
            operation: "read",
            source: ClientError::Rejected { .. },
        }
    ));
    assert_eq!(sequencer.state(), SequencerState::Failed { step: 1 });
    drop(sequencer);

    let state = agent.join().unwrap();
    assert!(state.dirs.contains("pidir"), "remaining steps must not run");
    assert_eq!(state.received.len(), 2);
}

#[test]
fn test_legacy_read_truncated_at_capacity() {
    let (mut client, agent) = common::client(ResponseMode::Legacy, 16);
    client.create_dir("pidir").unwrap();
    client.write(todo_file(), TODO_CONTENT.as_bytes()).unwrap();

    let received = client.read(todo_file()).unwrap();
    assert_eq!(received.len(), 16);
    assert!(received.is_full());
    assert_eq!(received.bytes(), &TODO_CONTENT.as_bytes()[..16]);

    drop(client);
    agent.join().unwrap();
}

#[test]
fn test_legacy_read_exactly_at_capacity() {
    let content = b"0123456789abcdef";
    let (mut client, agent) = common::client(ResponseMode::Legacy, content.len());
    client.create_dir("pidir").unwrap();
    client.write("pidir/exact", content).unwrap();

    let received = client.read("pidir/exact").unwrap();
    assert!(received.is_full());
    assert_eq!(received.into_bytes(), content.to_vec());

    drop(client);
    agent.join().unwrap();
}

#[test]
fn test_legacy_read_of_missing_file_reports_close() {
    let (mut client, agent) = common::client(ResponseMode::Legacy, DEFAULT_READ_CAPACITY);
    assert!(matches!(
        client.read("nope.txt"),
        Err(ClientError::Transport(TransportError::Closed))
    ));
    agent.join().unwrap();
}

#[test]
fn test_repeated_remove_dir_all() {
    let (mut client, agent) = common::client(ResponseMode::Framed, DEFAULT_READ_CAPACITY);
    client.create_dir("pidir").unwrap();
    assert_eq!(client.remove_dir_all("pidir").unwrap(), Response::Ack);

    match client.remove_dir_all("pidir") {
        Err(ClientError::Rejected { operation, message }) => {
            assert_eq!(operation, "remove_dir_all");
            assert!(message.contains("pidir"));
        }
        other => panic!("expected the agent's rejection, got {other:?}"),
    }

    // The connection is still usable afterwards.
    assert_eq!(client.create_dir("pidir").unwrap(), Response::Ack);
    drop(client);
    agent.join().unwrap();
}

#[test]
fn test_repeated_remove_dir_all_legacy() {
    let (mut client, agent) = common::client(ResponseMode::Legacy, DEFAULT_READ_CAPACITY);
    client.create_dir("pidir").unwrap();
    client.remove_dir_all("pidir").unwrap();
    assert_eq!(client.remove_dir_all("pidir").unwrap(), Response::Unacknowledged);
    drop(client);
    assert_eq!(agent.join().unwrap().received.len(), 3);
}
