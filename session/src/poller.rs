use crate::error::SessionError;
use crate::session::{ParameterValues, Session};
use crate::shutdown::Shutdown;
use log::{debug, warn};
use respeaker_types::ParameterValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterUpdate {
    pub name: &'static str,
    pub value: ParameterValue,
}

/// Returns the entries in `current` which are new or differ from `previous`, and records them.
pub fn changed_values(
    previous: &mut HashMap<&'static str, ParameterValue>,
    current: &ParameterValues,
) -> Vec<ParameterUpdate> {
    let mut updates = vec![];
    for &(name, value) in current {
        if previous.get(name) != Some(&value) {
            previous.insert(name, value);
            updates.push(ParameterUpdate { name, value });
        }
    }
    updates
}

pub async fn spawn_parameter_poller(
    session: Arc<Session>,
    interval: Duration,
    sender: UnboundedSender<ParameterUpdate>,
    mut shutdown: Shutdown,
) {
    let poll_sleep = sleep(interval);
    tokio::pin!(poll_sleep);

    let mut previous = HashMap::new();
    loop {
        tokio::select! {
            () = &mut poll_sleep => {
                let target = session.clone();
                match tokio::task::spawn_blocking(move || target.refresh_all()).await {
                    Ok(Ok(values)) => {
                        for update in changed_values(&mut previous, &values) {
                            if sender.send(update).is_err() {
                                debug!("Parameter receiver has gone, stopping poller");
                                return;
                            }
                        }
                    }

                    // Whatever we knew belonged to the last connection.
                    Ok(Err(SessionError::NotConnected)) => previous.clear(),
                    Ok(Err(error)) => {
                        warn!("Unable to poll parameters: {}", error);
                        previous.clear();
                    }
                    Err(error) => warn!("Parameter poll task failed: {}", error),
                }
                poll_sleep.as_mut().reset(tokio::time::Instant::now() + interval);
            }
            () = shutdown.recv() => {
                debug!("Shutdown triggered, stopping poller");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{scenario_descriptor, MockBus, SCENARIO};
    use respeaker_types::ParameterTable;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[test]
    fn only_changes_are_reported() {
        let mut previous = HashMap::new();
        let first = vec![
            ("mic_gain", ParameterValue::Integer(4)),
            ("voice_activity", ParameterValue::Boolean(false)),
        ];
        assert_eq!(changed_values(&mut previous, &first).len(), 2);
        assert!(changed_values(&mut previous, &first).is_empty());

        let second = vec![
            ("mic_gain", ParameterValue::Integer(4)),
            ("voice_activity", ParameterValue::Boolean(true)),
        ];
        assert_eq!(
            changed_values(&mut previous, &second),
            vec![ParameterUpdate {
                name: "voice_activity",
                value: ParameterValue::Boolean(true)
            }]
        );
    }

    #[tokio::test]
    async fn poller_publishes_device_changes() {
        let table = ParameterTable::new(SCENARIO).unwrap();
        let bus = Arc::new(MockBus::new(table));
        let session = Arc::new(Session::new(bus.clone(), table));
        session.connect(&scenario_descriptor()).unwrap();

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let poller = tokio::spawn(spawn_parameter_poller(
            session.clone(),
            Duration::from_millis(10),
            sender,
            shutdown.clone(),
        ));

        // The first poll reports everything.
        let wait = Duration::from_secs(2);
        for _ in 0..SCENARIO.len() {
            timeout(wait, receiver.recv()).await.unwrap().unwrap();
        }

        bus.poke("voice_activity", ParameterValue::Boolean(true));
        assert_eq!(
            timeout(wait, receiver.recv()).await.unwrap(),
            Some(ParameterUpdate {
                name: "voice_activity",
                value: ParameterValue::Boolean(true)
            })
        );

        shutdown.trigger();
        timeout(wait, poller).await.unwrap().unwrap();
        assert!(receiver.try_recv().is_err());
    }
}
