// Integration tests for the trigger/echo distance protocol

use firmbridge::ultrasonic::micros_to_cm;
use firmbridge::{BlockArgs, Dispatcher, EchoBehavior, SimulatedSession};
use firmbridge_shared::config::Config;
use firmbridge_shared::{CommandError, Failure, Payload, Pin, PinMode, Rejection};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn pin(p: &str) -> BlockArgs {
    BlockArgs::from([("PIN".to_string(), p.to_string())])
}

async fn wired(config: &Config) -> (Arc<SimulatedSession>, Dispatcher) {
    let session = Arc::new(SimulatedSession::new());
    let dispatcher = Dispatcher::new(config, session.clone()).unwrap();
    dispatcher.dispatch_block("setPinTrigger", &pin("D8")).await.unwrap();
    dispatcher.dispatch_block("setPinEcho", &pin("D7")).await.unwrap();
    (session, dispatcher)
}

async fn read_distance(dispatcher: &Dispatcher) -> f64 {
    dispatcher
        .dispatch_block("readDistance", &BlockArgs::new())
        .await
        .unwrap()
        .as_number()
        .unwrap()
}

#[tokio::test]
async fn test_registration_configures_pins() {
    let (session, dispatcher) = wired(&Config::default()).await;
    assert_eq!(session.pin_mode(Pin::Digital(8)).await, Some(PinMode::Output));
    assert_eq!(session.pin_mode(Pin::Digital(7)).await, Some(PinMode::Input));
    assert_eq!(
        session.lines().await,
        vec![
            "set_pin_mode D8 OUTPUT".to_string(),
            "set_pin_mode D7 INPUT".to_string()
        ]
    );
    // trigger and echo must be plain digital pins on the board
    assert!(matches!(
        dispatcher.dispatch_block("setPinEcho", &pin("D14")).await,
        Err(CommandError::Rejected(Rejection::IncompatiblePin { .. }))
    ));
}

#[tokio::test]
async fn test_read_distance_defaults_to_zero() {
    let dispatcher = Dispatcher::with_profile(
        &firmbridge_shared::board_config::ARDUINO_NANO,
        Arc::new(SimulatedSession::new()),
    );
    assert_eq!(read_distance(&dispatcher).await, 0.0);
    assert_eq!(dispatcher.ultrasonic().last_distance(), None);
}

#[tokio::test]
async fn test_known_echo_gives_expected_distance() {
    let (session, dispatcher) = wired(&Config::default()).await;
    session.set_echo(EchoBehavior::Pulse(1166)).await;
    session.clear_log().await;

    assert_eq!(
        dispatcher.dispatch_block("getDistance", &BlockArgs::new()).await,
        Ok(Payload::Unit)
    );
    let expected = 1166.0 / 2.0 * 0.0343;
    assert!((read_distance(&dispatcher).await - expected).abs() < 1e-6);
    assert!((micros_to_cm(1166.0) - 19.9969).abs() < 1e-3);
    assert_eq!(
        session.lines().await,
        vec![
            "pulse_out D8 2 10".to_string(),
            "pulse_in D7 1 30000".to_string()
        ]
    );
}

#[tokio::test]
async fn test_timeout_keeps_previous_distance() {
    let (session, dispatcher) = wired(&Config::default()).await;
    // 2449us round trip is ~42 cm
    session.set_echo(EchoBehavior::Pulse(2449)).await;
    dispatcher
        .dispatch_block("getDistance", &BlockArgs::new())
        .await
        .unwrap();
    let before = read_distance(&dispatcher).await;
    assert!((before - 42.0).abs() < 0.01);

    session.set_echo(EchoBehavior::NoPulse).await;
    assert_eq!(
        dispatcher.dispatch_block("getDistance", &BlockArgs::new()).await,
        Err(CommandError::Failed(Failure::EchoTimeout {
            timeout_micros: 30_000
        }))
    );
    assert_eq!(read_distance(&dispatcher).await, before);

    // a retry after the timeout measures again
    session.set_echo(EchoBehavior::Pulse(1000)).await;
    dispatcher
        .dispatch_block("getDistance", &BlockArgs::new())
        .await
        .unwrap();
    assert!((read_distance(&dispatcher).await - 17.15).abs() < 1e-9);
}

#[tokio::test]
async fn test_silent_session_is_bounded() {
    let mut config = Config::default();
    config.link.response_timeout_ms = 20;
    config.ultrasonic.timeout_micros = 10_000;
    let (session, dispatcher) = wired(&config).await;
    session.set_echo(EchoBehavior::Hang).await;

    let started = Instant::now();
    let result = dispatcher.dispatch_block("getDistance", &BlockArgs::new()).await;
    assert_eq!(
        result,
        Err(CommandError::Failed(Failure::EchoTimeout {
            timeout_micros: 10_000
        }))
    );
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(dispatcher.ultrasonic().last_distance(), None);
}

#[tokio::test]
async fn test_get_distance_needs_registered_pins() {
    let session = Arc::new(SimulatedSession::new());
    let dispatcher = Dispatcher::new(&Config::default(), session.clone()).unwrap();
    dispatcher.dispatch_block("setPinEcho", &pin("7")).await.unwrap();
    assert_eq!(
        dispatcher.dispatch_block("getDistance", &BlockArgs::new()).await,
        Err(CommandError::Rejected(Rejection::PinNotAssigned("trigger")))
    );
}

#[tokio::test]
async fn test_stalled_trigger_releases_the_link() {
    let mut config = Config::default();
    config.link.response_timeout_ms = 20;
    config.ultrasonic.timeout_micros = 10_000;
    let (session, dispatcher) = wired(&config).await;
    session.set_echo(EchoBehavior::Pulse(1000)).await;
    session.hang_next().await;

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        dispatcher.dispatch_block("getDistance", &BlockArgs::new()),
    )
    .await
    .expect("getDistance must end on its own");
    assert_eq!(
        result,
        Err(CommandError::Failed(Failure::EchoTimeout {
            timeout_micros: 10_000
        }))
    );
    assert_eq!(dispatcher.ultrasonic().last_distance(), None);

    // the next measurement gets the link and succeeds
    dispatcher
        .dispatch_block("getDistance", &BlockArgs::new())
        .await
        .unwrap();
    assert!((read_distance(&dispatcher).await - 17.15).abs() < 1e-9);
}
