//! Device manager subscription and list refresh.
//!
//! Device-list notifications say only that something changed, so every one
//! triggers a full re-query and the result replaces the list wholesale.
//! Queries are async. With a [`TaskSpawner`] each runs as its own task;
//! without one they wait in a queue that [`crate::Adapter::settle`] drives.
//! A generation counter per list discards a result when a later refresh of
//! the same list has started, so the snapshot follows notification order
//! even if queries finish out of order.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, RemoteHandle},
};
use switchboard_core::Event;
use tokio::task::LocalSet;
use tracing::{debug, warn};

use crate::{
    AdapterError,
    adapter::{Inner, listen},
    registry::{EntityKey, Subscription, SubscriptionToken},
    sdk::{DeviceManagerObject, EventKind, Notification, SdkFuture},
};

/// A device list that is re-queried as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceList {
    Cameras,
    Microphones,
    Speakers,
}

impl DeviceList {
    fn index(self) -> usize {
        match self {
            Self::Cameras => 0,
            Self::Microphones => 1,
            Self::Speakers => 2,
        }
    }

    fn query(self, manager: &dyn DeviceManagerObject) -> SdkFuture<Event> {
        match self {
            Self::Cameras => {
                let query = manager.get_cameras();
                Box::pin(async move {
                    query.await.map(|cameras| Event::CamerasUpdated { cameras })
                })
            },
            Self::Microphones => {
                let query = manager.get_microphones();
                Box::pin(async move {
                    query.await.map(|microphones| Event::MicrophonesUpdated { microphones })
                })
            },
            Self::Speakers => {
                let query = manager.get_speakers();
                Box::pin(async move {
                    query.await.map(|speakers| Event::SpeakersUpdated { speakers })
                })
            },
        }
    }
}

/// Runs device re-queries as local tasks.
pub trait TaskSpawner {
    /// Start `task`. It must be polled to completion on this thread.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

impl TaskSpawner for LocalSet {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        // Completion is observed through the remote handle.
        drop(self.spawn_local(task));
    }
}

enum RefreshTask {
    /// Not started; polled by `settle`.
    Queued(LocalBoxFuture<'static, ()>),
    /// Running on the spawner.
    Spawned { done: Rc<Cell<bool>>, handle: RemoteHandle<()> },
}

impl RefreshTask {
    fn is_done(&self) -> bool {
        matches!(self, Self::Spawned { done, .. } if done.get())
    }

    fn into_future(self) -> LocalBoxFuture<'static, ()> {
        match self {
            Self::Queued(task) => task,
            Self::Spawned { handle, .. } => handle.boxed_local(),
        }
    }
}

/// Outstanding refresh tasks and their generations.
#[derive(Default)]
pub(crate) struct DeviceRefresh {
    generations: [Cell<u64>; 3],
    spawner: Option<Rc<dyn TaskSpawner>>,
    tasks: RefCell<Vec<RefreshTask>>,
}

impl DeviceRefresh {
    pub fn with_spawner(spawner: Option<Rc<dyn TaskSpawner>>) -> Self {
        Self { spawner, ..Self::default() }
    }

    fn next_generation(&self, list: DeviceList) -> u64 {
        let cell = &self.generations[list.index()];
        cell.set(cell.get() + 1);
        cell.get()
    }

    fn is_current(&self, list: DeviceList, generation: u64) -> bool {
        self.generations[list.index()].get() == generation
    }

    fn start(&self, work: LocalBoxFuture<'static, ()>) {
        let task = match &self.spawner {
            Some(spawner) => {
                let done = Rc::new(Cell::new(false));
                let flag = Rc::clone(&done);
                let (task, handle) = async move {
                    work.await;
                    flag.set(true);
                }
                .remote_handle();
                spawner.spawn(task.boxed_local());
                RefreshTask::Spawned { done, handle }
            },
            None => RefreshTask::Queued(work),
        };
        let mut tasks = self.tasks.borrow_mut();
        tasks.retain(|t| !t.is_done());
        tasks.push(task);
    }

    /// Wait until no refresh is outstanding, including ones started meanwhile.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<RefreshTask> = self.tasks.borrow_mut().drain(..).collect();
            if pending.is_empty() {
                return;
            }
            futures::future::join_all(pending.into_iter().map(RefreshTask::into_future)).await;
        }
    }
}

/// Start a re-query of `list`.
fn refresh(
    inner: &Rc<Inner>,
    manager: &dyn DeviceManagerObject,
    alive: &Rc<Cell<bool>>,
    list: DeviceList,
) {
    let generation = inner.devices.next_generation(list);
    let query = list.query(manager);
    let weak: Weak<Inner> = Rc::downgrade(inner);
    let alive = Rc::clone(alive);

    inner.devices.start(Box::pin(async move {
        let result = query.await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !alive.get() || !inner.devices.is_current(list, generation) {
            debug!(?list, generation, "discarding superseded device query");
            return;
        }
        match result {
            Ok(event) => inner.store.dispatch(event),
            Err(err) => warn!(?list, error = %err, "device query failed"),
        }
    }));
}

fn selection_events(manager: &dyn DeviceManagerObject) -> [Event; 3] {
    [
        Event::SelectedMicrophoneChanged { microphone: manager.selected_microphone() },
        Event::SelectedSpeakerChanged { speaker: manager.selected_speaker() },
        Event::SpeakerSelectionAvailabilityChanged {
            available: manager.is_speaker_selection_available(),
        },
    ]
}

/// Seed device lists and selections, then subscribe.
///
/// Returns the existing token if the manager was attached while the initial
/// queries were in flight.
pub(crate) async fn attach(
    inner: &Rc<Inner>,
    manager: Rc<dyn DeviceManagerObject>,
    token: SubscriptionToken,
) -> Result<Option<SubscriptionToken>, AdapterError> {
    let (cameras, microphones, speakers) = futures::try_join!(
        manager.get_cameras(),
        manager.get_microphones(),
        manager.get_speakers()
    )?;

    let object = manager.object_id();
    let existing = inner.registry.borrow().token_of(object);
    if existing.is_some() {
        return Ok(existing);
    }

    inner.store.dispatch(Event::CamerasUpdated { cameras });
    inner.store.dispatch(Event::MicrophonesUpdated { microphones });
    inner.store.dispatch(Event::SpeakersUpdated { speakers });
    for event in selection_events(manager.as_ref()) {
        inner.store.dispatch(event);
    }

    let alive = Rc::new(Cell::new(true));
    let mut subscription = Subscription::new(
        manager.clone(),
        EntityKey::DeviceManager(object),
        token,
        None,
        Rc::clone(&alive),
    );
    for kind in EventKind::DEVICE_MANAGER {
        let weak = Rc::downgrade(&manager);
        let alive = Rc::clone(&alive);
        listen(inner, &mut subscription, kind, move |inner, notification| {
            if !matches!(notification, Notification::Changed) {
                warn!(%kind, ?notification, "unexpected payload dropped");
                return;
            }
            let Some(manager) = weak.upgrade() else {
                return;
            };
            match kind {
                EventKind::VideoDevicesUpdated => {
                    refresh(inner, manager.as_ref(), &alive, DeviceList::Cameras);
                },
                EventKind::AudioDevicesUpdated => {
                    refresh(inner, manager.as_ref(), &alive, DeviceList::Microphones);
                    refresh(inner, manager.as_ref(), &alive, DeviceList::Speakers);
                },
                EventKind::SelectedMicrophoneChanged => {
                    inner.store.dispatch(Event::SelectedMicrophoneChanged {
                        microphone: manager.selected_microphone(),
                    });
                },
                EventKind::SelectedSpeakerChanged => {
                    inner.store.dispatch(Event::SelectedSpeakerChanged {
                        speaker: manager.selected_speaker(),
                    });
                },
                _ => {},
            }
        });
    }
    inner.register(subscription);
    *inner.device_manager.borrow_mut() = Some(manager);
    debug!(?object, "device manager attached");
    Ok(None)
}
