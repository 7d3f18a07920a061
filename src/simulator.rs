use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::{
    error::Error,
    transport::{Transport, TransportEvent},
};

#[derive(Default)]
struct SimState {
    info_requests: Vec<String>,
    connect_requests: Vec<String>,
    sent: Vec<Vec<u8>>,
    close_requests: u32,
    shutdowns: u32,
    events: VecDeque<TransportEvent>,
}

/// Shared view into a [`SimTransport`], for scripting and inspecting the
/// network from tests while the runtime owns the transport itself.
#[derive(Clone)]
pub struct SimHandle(Rc<RefCell<SimState>>);

impl SimHandle {
    pub fn push_info(&self, status: u16, body: &[u8]) {
        self.0.borrow_mut().events.push_back(TransportEvent::Info {
            status,
            body: body.to_vec(),
        });
    }

    pub fn push_info_failed(&self, msg: &str) {
        self.0
            .borrow_mut()
            .events
            .push_back(TransportEvent::InfoFailed(msg.to_owned()));
    }

    pub fn push_opened(&self) {
        self.0.borrow_mut().events.push_back(TransportEvent::Opened);
    }

    pub fn push_message(&self, data: Vec<u8>) {
        self.0
            .borrow_mut()
            .events
            .push_back(TransportEvent::Message(data));
    }

    pub fn push_errored(&self) {
        self.0.borrow_mut().events.push_back(TransportEvent::Errored);
    }

    pub fn push_closed(&self, clean: bool, code: u16) {
        self.0
            .borrow_mut()
            .events
            .push_back(TransportEvent::Closed { clean, code });
    }

    pub fn info_requests(&self) -> Vec<String> {
        self.0.borrow().info_requests.clone()
    }

    pub fn connect_requests(&self) -> Vec<String> {
        self.0.borrow().connect_requests.clone()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.0.borrow().sent.clone()
    }

    pub fn close_requests(&self) -> u32 {
        self.0.borrow().close_requests
    }

    pub fn shutdowns(&self) -> u32 {
        self.0.borrow().shutdowns
    }
}

/// In-memory [`Transport`] for tests: records everything the runtime asks of
/// the network and replays whatever events the test scripts into it.
pub struct SimTransport {
    state: Rc<RefCell<SimState>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::default())),
        }
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle(Rc::clone(&self.state))
    }
}

impl Transport for SimTransport {
    type Error = Error;

    fn request_info(&mut self, url: &str) {
        self.state.borrow_mut().info_requests.push(url.to_owned());
    }

    fn connect(&mut self, url: &str) {
        self.state.borrow_mut().connect_requests.push(url.to_owned());
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.state.borrow_mut().sent.push(frame.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.state.borrow_mut().close_requests += 1;
    }

    fn shutdown(&mut self) {
        let mut state = self.state.borrow_mut();
        state.shutdowns += 1;
        state.events.clear();
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.state.borrow_mut().events.pop_front()
    }
}

/// Routes crate logs through `env_logger` for tests run with `RUST_LOG` set.
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}
