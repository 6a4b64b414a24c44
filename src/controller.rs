use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::trace;

use crate::domain::{CMDMode, Message, TVConfig, TVError};
use crate::model::Model;
use crate::record::Record;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub type LoadResult = Result<Vec<Record>, TVError>;

pub struct Controller {
    event_poll_time: u64,
    pending_load: Option<Receiver<LoadResult>>,
}

impl Controller {
    pub fn new(cfg: &TVConfig, pending_load: Receiver<LoadResult>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            pending_load: Some(pending_load),
        }
    }

    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, TVError> {
        if let Some(message) = self.poll_load() {
            return Ok(Some(message));
        }

        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    /// The data load runs on its own thread; its single result arrives here.
    fn poll_load(&mut self) -> Option<Message> {
        let receiver = self.pending_load.as_ref()?;
        let message = match receiver.try_recv() {
            Ok(Ok(records)) => Message::Loaded(records),
            Ok(Err(e)) => Message::LoadFailed(e.to_string()),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Message::LoadFailed("loader stopped without a result".to_string())
            }
        };
        self.pending_load = None;
        Some(message)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('/'), _) => Some(Message::EnterCommand(CMDMode::GlobalFilter)),
            (KeyCode::Char('f'), _) => Some(Message::EnterCommand(CMDMode::ColumnFilter)),
            (KeyCode::Char('s'), _) => Some(Message::SortSelectedColumn),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), KeyModifiers::NONE) => {
                Some(Message::MoveRight)
            }
            (KeyCode::Char('<'), _) => Some(Message::MoveColumnLeft),
            (KeyCode::Char('>'), _) => Some(Message::MoveColumnRight),
            (KeyCode::Char('n'), _) | (KeyCode::PageDown, _) => Some(Message::NextPage),
            (KeyCode::Char('p'), _) | (KeyCode::PageUp, _) => Some(Message::PreviousPage),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char('r'), _) => Some(Message::CyclePageSize),
            (KeyCode::Char('w'), _) => Some(Message::EnterCommand(CMDMode::SaveView)),
            (KeyCode::Char('o'), _) => Some(Message::EnterCommand(CMDMode::LoadView)),
            (KeyCode::Char('d'), _) => Some(Message::EnterCommand(CMDMode::DeleteView)),
            (KeyCode::Char('V'), _) => Some(Message::ShowViews),
            (KeyCode::Char('S'), _) => Some(Message::ShareLink),
            (KeyCode::Char('v'), _) => Some(Message::EnterCommand(CMDMode::OpenShareLink)),
            (KeyCode::Char('R'), _) => Some(Message::Reset),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn load_result_is_delivered_once() {
        let (tx, rx) = mpsc::channel();
        let mut controller = Controller::new(&TVConfig::default(), rx);
        assert!(controller.poll_load().is_none());

        tx.send(Ok(vec![Record::new().with("legal_name", "ACME")])).unwrap();
        assert!(matches!(controller.poll_load(), Some(Message::Loaded(r)) if r.len() == 1));
        assert!(controller.poll_load().is_none());
    }

    #[test]
    fn dropped_loader_is_a_failure() {
        let (tx, rx) = mpsc::channel::<LoadResult>();
        drop(tx);
        let mut controller = Controller::new(&TVConfig::default(), rx);
        assert!(matches!(controller.poll_load(), Some(Message::LoadFailed(_))));
    }

    #[test]
    fn key_map() {
        let (_tx, rx) = mpsc::channel();
        let controller = Controller::new(&TVConfig::default(), rx);
        let press = |c| controller.handle_key(event::KeyEvent::new(c, KeyModifiers::NONE));
        assert!(matches!(press(KeyCode::Char('S')), Some(Message::ShareLink)));
        assert!(matches!(
            press(KeyCode::Char('/')),
            Some(Message::EnterCommand(CMDMode::GlobalFilter))
        ));
        assert!(matches!(press(KeyCode::PageDown), Some(Message::NextPage)));
        assert!(press(KeyCode::Char('x')).is_none());
    }
}
