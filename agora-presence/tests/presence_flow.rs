//! End-to-end presence flows driven through connection mailboxes

use agora_core::config::ConferenceConfig;
use agora_core::models::{ConferenceId, ConnectionId, MediaUpdate, ParticipantId, RoomId};
use agora_presence::{ClientEvent, Coordinator, Delivery, ServerEvent, UserData};
use std::sync::{Arc, Barrier};
use tokio::sync::mpsc;

struct Client {
    conn: ConnectionId,
    rx: mpsc::Receiver<Delivery>,
}

impl Client {
    fn connect(coordinator: &Coordinator) -> Self {
        let (conn, rx) = coordinator.connect();
        Self { conn, rx }
    }

    fn join(&mut self, coordinator: &Coordinator, conference: &str, room: Option<&str>, id: &str) {
        coordinator.handle_event(
            &self.conn,
            ClientEvent::JoinConference {
                conference_id: ConferenceId::from(conference),
                room_id: room.map(RoomId::from),
                user_data: UserData {
                    id: Some(ParticipantId::from(id)),
                    name: id.to_uppercase(),
                    ..Default::default()
                },
            },
        );
    }

    fn send(&self, coordinator: &Coordinator, event: ClientEvent) {
        coordinator.handle_event(&self.conn, event);
    }

    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            if let Delivery::Event(event) = delivery {
                events.push(event);
            }
        }
        events
    }

    fn drain_types(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::event_type).collect()
    }
}

fn coordinator() -> Coordinator {
    Coordinator::new(ConferenceConfig::default())
}

fn change_room(room: &str) -> ClientEvent {
    ClientEvent::ChangeRoom {
        conference_id: None,
        new_room_id: RoomId::from(room),
    }
}

fn chat(text: &str) -> ClientEvent {
    ClientEvent::SendMessage {
        conference_id: None,
        room_id: None,
        message: text.to_string(),
    }
}

fn host_count(coordinator: &Coordinator, conference: &str) -> usize {
    coordinator
        .conference_snapshot(&ConferenceId::from(conference))
        .unwrap()
        .participants
        .iter()
        .filter(|p| p.is_host)
        .count()
}

#[tokio::test]
async fn test_first_joiner_creates_conference_and_is_host() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    assert_eq!(snapshot.rooms.len(), 1);
    assert!(snapshot.rooms[0].id.is_main());
    assert_eq!(snapshot.participants.len(), 1);
    assert!(snapshot.participants[0].is_host);
    assert!(snapshot.participants[0].room_id.is_main());

    let events = alice.drain();
    match &events[0] {
        ServerEvent::UserJoined {
            participant, rooms, ..
        } => {
            assert_eq!(participant.id.as_str(), "alice");
            assert_eq!(rooms[0].participant_count, 1);
        }
        other => panic!("Expected user-joined, got {}", other.event_type()),
    }
    assert_eq!(events[1].event_type(), "user-joined-room");
}

#[tokio::test]
async fn test_host_failover_names_second_participant() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    let bob_record = snapshot
        .participants
        .iter()
        .find(|p| p.id.as_str() == "bob")
        .unwrap();
    assert!(!bob_record.is_host);
    assert_eq!(host_count(&coordinator, "c1"), 1);

    bob.drain();
    coordinator.disconnect(&alice.conn);

    let events = bob.drain();
    let host_changed = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::HostChanged { participant_id, .. } => Some(participant_id.clone()),
            _ => None,
        })
        .expect("host-changed should be broadcast");
    assert_eq!(host_changed.as_str(), "bob");
    assert_eq!(host_count(&coordinator, "c1"), 1);
}

#[tokio::test]
async fn test_departure_order_and_no_reelection_for_guests() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    alice.drain();

    bob.send(
        &coordinator,
        ClientEvent::LeaveConference {
            conference_id: Some(ConferenceId::from("c1")),
        },
    );

    assert_eq!(alice.drain_types(), vec!["user-left-room", "user-left"]);
    assert_eq!(host_count(&coordinator, "c1"), 1);
}

#[tokio::test]
async fn test_empty_conference_is_removed() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", Some("side"), "bob");

    coordinator.disconnect(&alice.conn);
    assert!(coordinator.directory().contains(&ConferenceId::from("c1")));

    coordinator.disconnect(&bob.conn);
    assert!(!coordinator.directory().contains(&ConferenceId::from("c1")));
    assert!(coordinator.sessions().is_empty());

    // A second teardown is a no-op
    coordinator.disconnect(&bob.conn);
    assert!(coordinator.directory().is_empty());
}

#[tokio::test]
async fn test_main_room_survives_being_empty() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", Some("side"), "bob");
    alice.send(&coordinator, change_room("side"));

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    let main = snapshot.rooms.iter().find(|r| r.id.is_main()).unwrap();
    assert_eq!(main.participant_count, 0);
    assert!(!alice.drain_types().contains(&"room-removed"));
}

#[tokio::test]
async fn test_empty_side_room_is_removed_and_announced() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");

    bob.send(&coordinator, change_room("side"));
    let types = alice.drain_types();
    assert!(types.contains(&"room-created"));

    bob.send(&coordinator, change_room("main"));
    let events = alice.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::RoomRemoved { room_id } if room_id.as_str() == "side"
    )));

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    assert_eq!(snapshot.rooms.len(), 1);
}

#[tokio::test]
async fn test_side_room_removed_on_disconnect() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", Some("side"), "bob");
    alice.drain();

    coordinator.disconnect(&bob.conn);

    assert_eq!(alice.drain_types(), vec!["user-left", "room-removed"]);
}

#[tokio::test]
async fn test_non_host_mute_all_is_rejected() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    alice.drain();
    bob.drain();

    bob.send(
        &coordinator,
        ClientEvent::MuteAll {
            conference_id: Some(ConferenceId::from("c1")),
            room_id: None,
        },
    );

    let events = bob.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerEvent::Error { message } if message.contains("host")));
    assert!(alice.drain().is_empty());

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    assert!(snapshot.participants.iter().all(|p| p.is_audio_on));
}

#[tokio::test]
async fn test_host_mute_all() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);
    let mut carol = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    carol.join(&coordinator, "c1", Some("side"), "carol");
    alice.drain();
    bob.drain();
    carol.drain();

    alice.send(
        &coordinator,
        ClientEvent::MuteAll {
            conference_id: None,
            room_id: None,
        },
    );

    assert_eq!(bob.drain_types(), vec!["forced-mute", "all-participants-muted"]);
    assert_eq!(alice.drain_types(), vec!["all-participants-muted"]);
    assert!(carol.drain().is_empty());

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    for p in &snapshot.participants {
        match p.id.as_str() {
            "bob" => assert!(!p.is_audio_on),
            _ => assert!(p.is_audio_on),
        }
    }
}

#[tokio::test]
async fn test_invalid_reaction_is_rejected() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    alice.drain();
    bob.drain();

    alice.send(
        &coordinator,
        ClientEvent::SendReaction {
            conference_id: None,
            reaction_type: "not-a-real-type".to_string(),
        },
    );

    assert_eq!(alice.drain_types(), vec!["error"]);
    assert!(bob.drain().is_empty());

    alice.send(
        &coordinator,
        ClientEvent::SendReaction {
            conference_id: None,
            reaction_type: "heart".to_string(),
        },
    );
    assert_eq!(bob.drain_types(), vec!["reaction"]);
}

#[tokio::test]
async fn test_change_room_round_trip_restores_history() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    alice.send(&coordinator, chat("hello main"));
    alice.drain();

    alice.send(&coordinator, change_room("side"));
    bob.send(&coordinator, chat("while you were away"));
    alice.send(&coordinator, chat("hello side"));
    alice.drain();

    alice.send(&coordinator, change_room("main"));

    let events = alice.drain();
    let (participants, messages) = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::UserJoinedRoom {
                room_id,
                participants,
                messages,
                ..
            } if room_id.is_main() => Some((participants.clone(), messages.clone())),
            _ => None,
        })
        .expect("user-joined-room for main");

    let ids: Vec<_> = participants.iter().map(|p| p.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["bob", "alice"]);
    let texts: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, vec!["hello main", "while you were away"]);

    let session = coordinator.sessions().lookup(&alice.conn).unwrap();
    assert!(session.room_id.is_main());
}

#[tokio::test]
async fn test_room_change_keeps_host() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    bob.drain();

    alice.send(&coordinator, change_room("side"));

    assert!(!bob.drain_types().contains(&"host-changed"));
    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    let host = snapshot.participants.iter().find(|p| p.is_host).unwrap();
    assert_eq!(host.id.as_str(), "alice");
}

#[tokio::test]
async fn test_message_validation() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    alice.join(&coordinator, "c1", None, "alice");
    alice.drain();

    alice.send(&coordinator, chat("   "));
    assert_eq!(alice.drain_types(), vec!["error"]);

    alice.send(&coordinator, chat(&"x".repeat(4001)));
    assert_eq!(alice.drain_types(), vec!["error"]);

    alice.send(
        &coordinator,
        ClientEvent::SendMessage {
            conference_id: None,
            room_id: Some(RoomId::from("nowhere")),
            message: "hi".to_string(),
        },
    );
    let events = alice.drain();
    assert!(matches!(&events[0], ServerEvent::Error { message } if message.contains("not found")));
}

#[tokio::test]
async fn test_messages_stay_in_their_room() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", Some("side"), "bob");
    alice.drain();
    bob.drain();

    alice.send(&coordinator, chat("main only"));

    assert_eq!(alice.drain_types(), vec!["new-message"]);
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn test_update_media_reaches_whole_conference() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", Some("side"), "bob");
    alice.drain();

    bob.send(
        &coordinator,
        ClientEvent::UpdateMedia {
            conference_id: None,
            updates: MediaUpdate {
                is_screen_sharing: Some(true),
                ..Default::default()
            },
        },
    );

    let events = alice.drain();
    assert!(matches!(
        &events[0],
        ServerEvent::UserUpdated { participant_id, updates }
            if participant_id.as_str() == "bob" && updates.is_screen_sharing == Some(true)
    ));

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("c1"))
        .unwrap();
    let bob_record = snapshot
        .participants
        .iter()
        .find(|p| p.id.as_str() == "bob")
        .unwrap();
    assert!(bob_record.is_screen_sharing);
    assert!(bob_record.is_video_on);
}

#[tokio::test]
async fn test_hands_are_room_scoped() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);
    let mut carol = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    carol.join(&coordinator, "c1", Some("side"), "carol");
    alice.drain();
    carol.drain();

    bob.send(&coordinator, ClientEvent::RaiseHand { conference_id: None });
    bob.send(&coordinator, ClientEvent::LowerHand { conference_id: None });

    assert_eq!(alice.drain_types(), vec!["hand-raised", "hand-lowered"]);
    assert!(carol.drain().is_empty());
}

#[tokio::test]
async fn test_kick_notifies_and_closes() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    let mut bob = Client::connect(&coordinator);

    alice.join(&coordinator, "c1", None, "alice");
    bob.join(&coordinator, "c1", None, "bob");
    alice.drain();
    bob.drain();

    coordinator
        .kick(&ConferenceId::from("c1"), &ParticipantId::from("bob"))
        .unwrap();

    let mut saw_kick = false;
    let mut saw_close = false;
    while let Ok(delivery) = bob.rx.try_recv() {
        match delivery {
            Delivery::Event(ServerEvent::KickedFromConference { .. }) => saw_kick = true,
            Delivery::Close => saw_close = true,
            Delivery::Event(_) => {}
        }
    }
    assert!(saw_kick);
    assert!(saw_close);
    assert_eq!(alice.drain_types(), vec!["user-left-room", "user-left"]);
    assert!(coordinator.sessions().lookup(&bob.conn).is_none());

    // The transport's own close arrives afterwards and is harmless
    coordinator.disconnect(&bob.conn);
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_kick_last_participant_removes_conference() {
    let coordinator = coordinator();
    let mut alice = Client::connect(&coordinator);
    alice.join(&coordinator, "c1", None, "alice");

    coordinator
        .kick(&ConferenceId::from("c1"), &ParticipantId::from("alice"))
        .unwrap();

    assert!(!coordinator.directory().contains(&ConferenceId::from("c1")));
    assert!(coordinator
        .kick(&ConferenceId::from("c1"), &ParticipantId::from("alice"))
        .is_err());
}

#[tokio::test]
async fn test_pre_created_conference_first_joiner_is_host() {
    let coordinator = coordinator();
    let conference_id = coordinator.create_conference();
    let mut alice = Client::connect(&coordinator);

    alice.join(&coordinator, conference_id.as_str(), None, "alice");

    assert_eq!(host_count(&coordinator, conference_id.as_str()), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_and_leaves_keep_invariants() {
    const WORKERS: usize = 8;
    const ROUNDS: usize = 25;

    let coordinator = coordinator();
    let start = Arc::new(Barrier::new(WORKERS));
    let mut handles = Vec::new();

    for i in 0..WORKERS {
        let coordinator = coordinator.clone();
        let start = Arc::clone(&start);
        // Blocking threads so every worker really runs at the same time
        handles.push(tokio::task::spawn_blocking(move || {
            let mut client = Client::connect(&coordinator);
            start.wait();
            for round in 0..ROUNDS {
                let room = if (i + round) % 2 == 0 { None } else { Some("side") };
                client.join(&coordinator, "busy", room, &format!("p{i}"));
                client.send(&coordinator, change_room(if room.is_some() { "main" } else { "side" }));
                client.send(&coordinator, chat("hello"));
                if round % 3 == 0 {
                    coordinator.disconnect(&client.conn);
                    client = Client::connect(&coordinator);
                } else {
                    client.send(&coordinator, ClientEvent::LeaveConference { conference_id: None });
                }
                client.drain();
            }
            client.join(&coordinator, "busy", None, &format!("p{i}"));
            client
        }));
    }

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.unwrap());
    }

    let snapshot = coordinator
        .conference_snapshot(&ConferenceId::from("busy"))
        .unwrap();
    assert_eq!(snapshot.participants.len(), WORKERS);
    assert_eq!(host_count(&coordinator, "busy"), 1);
    assert_eq!(coordinator.sessions().len(), WORKERS);

    for client in &clients {
        coordinator.disconnect(&client.conn);
    }
    assert!(coordinator.directory().is_empty());
    assert!(coordinator.sessions().is_empty());
}
