//! The framed session: one connected client.
//!
//! A [`Session`] is shared (`Arc`) between reactor threads, which feed it
//! received bytes and send completions, and the game loop, which queues
//! responses on it. Its state is split so those sides rarely contend:
//!
//! - `inbound`: the [`RecvBuffer`]. Only one receive is ever armed, so in
//!   practice one reactor thread holds it at a time.
//! - `outbound` + `sending`: the frame FIFO and the single-flight flag. At
//!   most one frame is being written to the socket at any moment, and frames
//!   go out in the order they were queued.
//! - `meta`: display name, login state and current room.
//! - `closed`: set once by [`disconnect`](Session::disconnect).

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use skirmish_protocol::{PacketId, Response, RoomId, SessionId, encode_frame};
use skirmish_transport::Link;

use crate::buffer::is_login;
use crate::{Command, CommandSender, RecvBuffer, SessionError};

/// Name shown for a connection that has not logged in.
pub const GUEST_NAME: &str = "Guest";

#[derive(Debug)]
struct SessionMeta {
    name: String,
    logged_in: bool,
    room: Option<RoomId>,
}

/// One client connection.
pub struct Session {
    id: SessionId,
    link: Box<dyn Link>,
    commands: CommandSender,
    inbound: Mutex<RecvBuffer>,
    outbound: Mutex<VecDeque<Vec<u8>>>,
    sending: AtomicBool,
    meta: Mutex<SessionMeta>,
    closed: AtomicBool,
}

impl Session {
    /// Creates a session over `link` that reports commands to `commands`.
    ///
    /// No receive is armed yet; call [`start`](Self::start) once the session
    /// is reachable through the directory.
    pub fn new(id: SessionId, link: Box<dyn Link>, commands: CommandSender) -> Self {
        Self::with_buffer(id, link, commands, RecvBuffer::new())
    }

    /// Like [`new`](Self::new) with a caller-supplied receive buffer.
    pub fn with_buffer(
        id: SessionId,
        link: Box<dyn Link>,
        commands: CommandSender,
        buffer: RecvBuffer,
    ) -> Self {
        Self {
            id,
            link,
            commands,
            inbound: Mutex::new(buffer),
            outbound: Mutex::new(VecDeque::new()),
            sending: AtomicBool::new(false),
            meta: Mutex::new(SessionMeta {
                name: GUEST_NAME.to_string(),
                logged_in: false,
                room: None,
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Arms the first receive.
    pub fn start(&self) {
        let free = self.inbound.lock().free_space();
        self.link.arm_receive(free);
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Locks the receive buffer.
    pub fn inbound(&self) -> MutexGuard<'_, RecvBuffer> {
        self.inbound.lock()
    }

    /// Handles one non-empty receive completion.
    ///
    /// Appends `data`, pushes every complete packet onto the command queue,
    /// compacts the buffer and re-arms a receive for the free space. A
    /// malformed Login packet is stepped over when `tolerate_malformed_login`
    /// is set; any other malformed packet is an error.
    ///
    /// Returns how many commands were queued.
    ///
    /// # Errors
    /// Any error means the connection is unusable and should be
    /// disconnected. Commands queued before the error stay queued.
    pub fn on_received(&self, data: &[u8], tolerate_malformed_login: bool) -> Result<usize, SessionError> {
        if self.is_closed() {
            return Ok(0);
        }

        let mut inbound = self.inbound.lock();
        inbound.append(data)?;

        let mut queued = 0;
        loop {
            match inbound.extract_next_command(self.id) {
                Ok(Some(command)) => {
                    tracing::trace!(session_id = %self.id, kind = command.kind(), "command queued");
                    self.commands
                        .send(command)
                        .map_err(|_| SessionError::QueueClosed)?;
                    queued += 1;
                }
                Ok(None) => break,
                Err(malformed) if tolerate_malformed_login && is_login(malformed.packet_id) => {
                    tracing::warn!(session_id = %self.id, error = %malformed, "skipping malformed login");
                    inbound.skip_packet();
                }
                Err(malformed) => return Err(malformed.into()),
            }
        }

        if let Some(declared) = inbound.pending_fault() {
            return Err(SessionError::Framing { declared });
        }

        inbound.compact_if_needed();
        let free = inbound.free_space();
        drop(inbound);

        self.link.arm_receive(free);
        Ok(queued)
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Frames `body` and queues it for delivery.
    ///
    /// If no send is in flight this starts one immediately. Frames queued on
    /// a closed session are dropped.
    ///
    /// # Errors
    /// Returns [`SessionError::Protocol`] if the frame would exceed the
    /// 16-bit size limit.
    pub fn enqueue_outbound(&self, packet_id: PacketId, body: &[u8]) -> Result<(), SessionError> {
        if self.is_closed() {
            return Ok(());
        }
        let frame = encode_frame(packet_id, body)?;
        self.outbound.lock().push_back(frame);

        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.deliver_next();
        }
        Ok(())
    }

    /// Queues an encoded response.
    pub fn send(&self, response: &Response) -> Result<(), SessionError> {
        self.enqueue_outbound(response.packet_id(), &response.encode_body())
    }

    /// Called when the in-flight send finished; starts the next one.
    pub fn on_send_completed(&self) {
        self.deliver_next();
    }

    /// Frames waiting behind the in-flight send.
    pub fn queued_frames(&self) -> usize {
        self.outbound.lock().len()
    }

    /// True while a send is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    fn deliver_next(&self) {
        let frame = {
            let mut queue = self.outbound.lock();
            let next = if self.is_closed() {
                queue.clear();
                None
            } else {
                queue.pop_front()
            };
            match next {
                Some(frame) => frame,
                None => {
                    // Cleared under the queue lock: an enqueue either sees
                    // the flag down and starts a send, or pushed before we
                    // looked and was popped above.
                    self.sending.store(false, Ordering::Release);
                    return;
                }
            }
        };
        self.link.begin_send(frame);
    }

    // -----------------------------------------------------------------------
    // Identity and room binding
    // -----------------------------------------------------------------------

    /// Display name ("Guest" until login).
    pub fn name(&self) -> String {
        self.meta.lock().name.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.meta.lock().logged_in
    }

    /// Binds a username after a successful login.
    pub fn bind_login(&self, username: &str) {
        let mut meta = self.meta.lock();
        meta.name = username.to_string();
        meta.logged_in = true;
    }

    /// Clears the login and returns the username it held.
    ///
    /// After this, [`disconnect`](Self::disconnect) will not synthesize a
    /// Logout command.
    pub fn logout(&self) -> Option<String> {
        let mut meta = self.meta.lock();
        if !meta.logged_in {
            return None;
        }
        meta.logged_in = false;
        Some(std::mem::replace(&mut meta.name, GUEST_NAME.to_string()))
    }

    /// The room this session is in, as recorded by the room manager.
    pub fn room(&self) -> Option<RoomId> {
        self.meta.lock().room
    }

    pub fn set_room(&self, room: Option<RoomId>) {
        self.meta.lock().room = room;
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the connection. Safe to call from any thread, any number of
    /// times; only the first call has an effect.
    ///
    /// If the session was logged in, a `Logout` carrying the username is
    /// pushed to the command queue so the game loop can release the
    /// player's room slot and presence entry.
    ///
    /// Returns `true` for the call that actually closed the session.
    pub fn disconnect(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.link.close();
        self.outbound.lock().clear();

        let username = self.logout();
        tracing::info!(session_id = %self.id, user = ?username, "session disconnected");

        if let Some(username) = username {
            let logout = Command::Logout {
                session_id: self.id,
                username: Some(username),
            };
            if self.commands.send(logout).is_err() {
                tracing::debug!(session_id = %self.id, "command queue closed, logout dropped");
            }
        }
        true
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skirmish_protocol::{Request, RoomId};
    use skirmish_transport::MemoryLink;

    use super::*;
    use crate::{CommandReceiver, command_queue};

    fn make_session() -> (Arc<Session>, MemoryLink, CommandReceiver) {
        let link = MemoryLink::new();
        let (tx, rx) = command_queue();
        let session = Arc::new(Session::new(SessionId(1), Box::new(link.clone()), tx));
        (session, link, rx)
    }

    #[test]
    fn test_new_session_is_guest() {
        let (session, _, _) = make_session();
        assert_eq!(session.name(), "Guest");
        assert!(!session.is_logged_in());
        assert_eq!(session.room(), None);
    }

    #[test]
    fn test_start_arms_full_buffer() {
        let (session, link, _) = make_session();
        session.start();
        assert_eq!(link.armed(), vec![crate::RECV_CAPACITY]);
    }

    #[test]
    fn test_on_received_queues_commands_and_rearms() {
        let (session, link, rx) = make_session();
        let mut bytes = Request::ListRooms.encode_frame().unwrap();
        bytes.extend(Request::Move { vx: 1.0, vy: 2.0 }.encode_frame().unwrap());
        bytes.extend_from_slice(&[4, 0]); // start of a third packet

        assert_eq!(session.on_received(&bytes, true).unwrap(), 2);
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(cmds.len(), 2);
        assert_eq!(link.armed(), vec![crate::RECV_CAPACITY - bytes.len()]);
        assert_eq!(session.inbound().unread(), 2);
    }

    #[test]
    fn test_malformed_login_is_skipped_when_tolerated() {
        let (session, _, rx) = make_session();
        let mut bytes = vec![8, 0, 3, 0, 1, 2, 3, 4];
        bytes.extend(Request::ListRooms.encode_frame().unwrap());

        assert_eq!(session.on_received(&bytes, true).unwrap(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::ListRooms {
                session_id: SessionId(1)
            }
        );
    }

    #[test]
    fn test_malformed_login_is_fatal_when_not_tolerated() {
        let (session, _, _) = make_session();
        let err = session.on_received(&[8, 0, 3, 0, 1, 2, 3, 4], false).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[test]
    fn test_malformed_other_packet_is_fatal() {
        let (session, _, _) = make_session();
        // EnterRoom with a 2-byte body.
        let err = session.on_received(&[6, 0, 5, 0, 1, 2], true).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(m) if m.packet_id == 5));
    }

    #[test]
    fn test_unknown_packet_is_fatal() {
        let (session, _, _) = make_session();
        let err = session.on_received(&[4, 0, 99, 0], true).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[test]
    fn test_impossible_size_is_framing_error() {
        let (session, _, _) = make_session();
        let err = session.on_received(&[0xff, 0xff, 7, 0], true).unwrap_err();
        assert!(matches!(err, SessionError::Framing { declared: 65535 }));
    }

    #[test]
    fn test_enqueue_starts_one_send_and_queues_the_rest() {
        let (session, link, _) = make_session();
        session.enqueue_outbound(PacketId::RoomListRes, &[0, 0, 0, 0]).unwrap();
        session.enqueue_outbound(PacketId::RegisterRes, &[1]).unwrap();

        assert_eq!(link.in_flight(), 1);
        assert_eq!(session.queued_frames(), 1);
        assert!(session.is_sending());

        link.complete_send();
        session.on_send_completed();
        assert_eq!(link.sent_frames().len(), 2);
        assert_eq!(link.sent_frames()[1], vec![5, 0, 2, 0, 1]);

        link.complete_send();
        session.on_send_completed();
        assert!(!session.is_sending());
    }

    #[test]
    fn test_single_flight_and_fifo_under_concurrent_enqueues() {
        let (session, link, _) = make_session();
        let threads = 4;
        let per_thread = 200u32;

        let producers: Vec<_> = (0..threads)
            .map(|t| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        let tag = t * 10_000 + i;
                        session
                            .enqueue_outbound(PacketId::Snapshot, &tag.to_le_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();

        // Play the completion port: finish whatever is in flight.
        let total = (threads * per_thread) as usize;
        while link.sent_frames().len() < total || link.in_flight() > 0 {
            if link.complete_send() {
                session.on_send_completed();
            } else {
                std::thread::yield_now();
            }
        }
        for p in producers {
            p.join().unwrap();
        }

        assert_eq!(link.max_in_flight(), 1);
        assert!(!session.is_sending());

        // Each producer's frames arrive in the order it queued them.
        let mut last = vec![None; threads as usize];
        for frame in link.sent_frames() {
            let tag = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
            let (t, i) = ((tag / 10_000) as usize, tag % 10_000);
            if let Some(prev) = last[t] {
                assert!(i > prev, "thread {t}: {i} after {prev}");
            }
            last[t] = Some(i);
        }
    }

    #[test]
    fn test_disconnect_is_idempotent_and_synthesizes_one_logout() {
        let (session, link, rx) = make_session();
        session.bind_login("bob");

        let closers: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.disconnect())
            })
            .collect();
        let winners = closers
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(link.close_calls(), 1);
        let cmds: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            cmds,
            vec![Command::Logout {
                session_id: SessionId(1),
                username: Some("bob".into())
            }]
        );
    }

    #[test]
    fn test_guest_disconnect_queues_nothing() {
        let (session, _, rx) = make_session();
        assert!(session.disconnect());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_explicit_logout_prevents_synthesized_logout() {
        let (session, _, rx) = make_session();
        session.bind_login("bob");
        assert_eq!(session.logout(), Some("bob".into()));
        assert_eq!(session.name(), "Guest");
        session.disconnect();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_session_drops_frames_and_input() {
        let (session, link, _) = make_session();
        session.disconnect();
        session.enqueue_outbound(PacketId::RegisterRes, &[1]).unwrap();
        assert!(link.sent_frames().is_empty());
        assert_eq!(
            session
                .on_received(&Request::ListRooms.encode_frame().unwrap(), true)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_room_binding() {
        let (session, _, _) = make_session();
        session.set_room(Some(RoomId(7)));
        assert_eq!(session.room(), Some(RoomId(7)));
    }
}
