//! Decision algorithm and control loop tests.
use super::algorithm::{Algorithm, AlgorithmKind, Decision};
use super::params::Parameter;
use super::pid::clamp;
use super::route::{Instruction, LeaderRoute, ScriptedRoute, Stationary};
use super::scheduler::{ControlLoop, LoopState};
use super::snapshot::{CarryForward, Snapshot, fuse};
use crate::config::Config;
use crate::packet::{Message, Motion, Packet, VehicleState};
use crate::platoon::{Coordinator, SequentialIds};
use crate::testing::{Command, FixedBeacons, FixedSensors, RecordingActuator};
use crate::transport::{Medium, MemoryTransport, Receipt, Transport};
use crate::vehicle::Beacon;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, advance};
use tokio_util::sync::CancellationToken;

const MAX: usize = 1024;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn snapshot(now: Instant, speed: f64, front_distance: Option<f64>) -> Snapshot {
    Snapshot {
        now,
        acceleration: 0.0,
        speed,
        turn_rate: 0.0,
        front_distance,
        message: None,
    }
}

fn drive(decision: Decision) -> Motion {
    match decision {
        Decision::Drive(chosen) => chosen,
        other => panic!("expected Drive, got {other:?}"),
    }
}

// --- Fusion and clamping ---

#[test]
fn test_fuse_averages_or_falls_back() {
    assert_eq!(fuse(Some(8.0), Some(6.0)), Some(7.0));
    assert_eq!(fuse(Some(8.0), None), Some(8.0));
    assert_eq!(fuse(None, Some(6.0)), Some(6.0));
    assert_eq!(fuse(None, None), None);
}

#[test]
fn test_clamp_stays_in_range() {
    for value in [-1e12, -2.5, -2.0, 0.0, 1.3, 2.0, 7.0, 1e12, f64::INFINITY, f64::NAN] {
        let clamped = clamp(value, -2.0, 2.0);
        assert!((-2.0..=2.0).contains(&clamped), "{value} clamped to {clamped}");
    }
    assert_eq!(clamp(1.3, -2.0, 2.0), 1.3);
}

// --- Adaptive cruise control ---

#[tokio::test(start_paused = true)]
async fn test_acc_dead_reckons_and_clamps() {
    let sent = Instant::now();
    let message = VehicleState::steady(Motion::new(10.0, 0.0, 0.0), sent);
    advance(Duration::from_millis(60)).await;

    let mut input = snapshot(Instant::now(), 10.0, Some(8.0));
    input.message = Some(message);
    let mut carry = CarryForward {
        distance: Some(8.0),
        speed: 10.0,
        acceleration: 0.0,
    };

    let mut algorithm = Algorithm::new(AlgorithmKind::Acc);
    algorithm.set_parameter(Parameter::MaxSensorDistance, 10.0);
    let chosen = drive(algorithm.decide(&input, &mut carry));

    // Both moved 0.6 m, so the prediction stays at 8 m and fuses with the 8 m
    // reading. P term 0.5 * (8 - 1.4) = 3.3 is clamped.
    assert_eq!(chosen.acceleration, 2.0);
    assert_eq!(chosen.speed, 10.0);
    assert_close(carry.distance.unwrap(), 8.0);
    assert_eq!(carry.speed, 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_acc_pid_terms_without_clamping() {
    let sent = Instant::now();
    let message = VehicleState::new(
        Motion::new(1.0, 0.0, 0.0),
        Motion::new(1.2, 0.0, 0.05),
        sent,
    );
    advance(Duration::from_millis(50)).await;

    let mut input = snapshot(Instant::now(), 1.0, Some(1.4));
    input.message = Some(message);
    let mut carry = CarryForward {
        distance: Some(1.5),
        speed: 1.0,
        acceleration: 0.0,
    };

    let chosen = drive(Algorithm::new(AlgorithmKind::Acc).decide(&input, &mut carry));
    // Predicted 1.5, fused with 1.4 to 1.45.
    // P: 0.5 * (1.45 - 0.5) = 0.475, D: 1.8 * (1.45 - 1.5) = -0.09.
    assert_close(chosen.acceleration, 0.385);
    assert_eq!(chosen.speed, 1.2, "adopts the predecessor's chosen speed");
    assert_eq!(chosen.turn_rate, 0.05);
    assert_close(carry.distance.unwrap(), 1.45);
}

#[test]
fn test_acc_first_decision_has_no_derivative() {
    let mut input = snapshot(Instant::now(), 0.0, Some(1.0));
    input.turn_rate = 0.2;
    let mut carry = CarryForward::default();

    let chosen = drive(Algorithm::new(AlgorithmKind::Acc).decide(&input, &mut carry));
    assert_close(chosen.acceleration, 0.3);
    assert_eq!(chosen.speed, 0.0, "holds own speed without a message");
    assert_eq!(chosen.turn_rate, 0.2);
    assert_eq!(carry.distance, Some(1.0));
}

#[test]
fn test_acc_ignores_sensor_beyond_range() {
    let mut carry = CarryForward::default();
    let input = snapshot(Instant::now(), 0.0, Some(2.5));
    assert_eq!(
        Algorithm::new(AlgorithmKind::Acc).decide(&input, &mut carry),
        Decision::EmergencyStop
    );
    assert_eq!(carry.distance, None);
}

#[test]
fn test_acc_without_any_distance_stops() {
    let mut carry = CarryForward::default();
    let input = snapshot(Instant::now(), 3.0, None);
    assert_eq!(
        Algorithm::new(AlgorithmKind::Acc).decide(&input, &mut carry),
        Decision::EmergencyStop
    );
}

#[tokio::test(start_paused = true)]
async fn test_cacc_adds_predecessor_chosen_acceleration() {
    let sent = Instant::now();
    let message = VehicleState::new(
        Motion::new(1.0, 0.0, 0.0),
        Motion::new(1.0, -0.2, 0.0),
        sent,
    );
    advance(Duration::from_millis(50)).await;

    let mut input = snapshot(Instant::now(), 1.0, Some(1.4));
    input.message = Some(message);
    let carry = CarryForward {
        distance: Some(1.5),
        speed: 1.0,
        acceleration: 0.0,
    };

    let (mut acc_carry, mut cacc_carry) = (carry, carry);
    let acc = drive(Algorithm::new(AlgorithmKind::Acc).decide(&input, &mut acc_carry));
    let cacc = drive(Algorithm::new(AlgorithmKind::Cacc).decide(&input, &mut cacc_carry));
    assert_close(acc.acceleration, 0.385);
    assert_close(cacc.acceleration, 0.185);
}

#[test]
fn test_basic_mirrors_or_holds_and_do_nothing_holds() {
    let now = Instant::now();
    let mut carry = CarryForward::default();
    let predecessor = Motion::new(4.0, 0.5, -0.1);

    let mut input = snapshot(now, 3.0, None);
    input.turn_rate = 0.3;
    assert_eq!(
        Algorithm::new(AlgorithmKind::Basic).decide(&input, &mut carry),
        Decision::Drive(Motion::new(3.0, 0.0, 0.3))
    );

    input.message = Some(VehicleState::new(Motion::default(), predecessor, now));
    assert_eq!(
        Algorithm::new(AlgorithmKind::Basic).decide(&input, &mut carry),
        Decision::Drive(predecessor)
    );

    assert_eq!(
        Algorithm::new(AlgorithmKind::DoNothing).decide(&input, &mut carry),
        Decision::Hold(Motion::new(3.0, 0.0, 0.3))
    );
    assert_eq!(carry, CarryForward::default());
}

// --- Parameter registry ---

#[test]
fn test_parameter_registry_by_kind() {
    let mut acc = Algorithm::new(AlgorithmKind::Acc);
    assert_eq!(acc.parameter(Parameter::PidP), Some(0.5));
    assert_eq!(acc.parameter(Parameter::PidI), Some(0.0));
    assert_eq!(acc.parameter(Parameter::FeedForwardGain), None);

    acc.set_parameter(Parameter::FeedForwardGain, 3.0);
    assert_eq!(acc.parameter(Parameter::FeedForwardGain), None);
    acc.set_parameter(Parameter::HeadwayTime, 0.3);
    assert_eq!(acc.parameter(Parameter::HeadwayTime), Some(0.3));

    let cacc = Algorithm::new(AlgorithmKind::Cacc);
    assert_eq!(cacc.parameter(Parameter::FeedForwardGain), Some(1.0));
    assert_eq!(cacc.parameter_list().len(), 9);

    let basic = Algorithm::new(AlgorithmKind::Basic);
    assert_eq!(basic.parameter_list(), &[Parameter::MaxSensorDistance]);
    assert_eq!(basic.parameter(Parameter::PidP), None);

    assert!(Algorithm::new(AlgorithmKind::DoNothing).parameter_list().is_empty());
}

#[test]
fn test_parameters_by_name() {
    let mut acc = Algorithm::new(AlgorithmKind::Acc);
    acc.set_parameter_by_name("max_acceleration", 1.5);
    acc.set_parameter_by_name("warp_factor", 9.0);
    assert_eq!(acc.parameter_by_name("max_acceleration"), Some(1.5));
    assert_eq!(acc.parameter_by_name("warp_factor"), None);
    assert_eq!(acc, {
        let mut expected = Algorithm::new(AlgorithmKind::Acc);
        expected.set_parameter(Parameter::MaxAcceleration, 1.5);
        expected
    });
}

#[test]
fn test_names_parse_and_print() {
    for kind in AlgorithmKind::ALL {
        assert_eq!(kind.to_string().parse::<AlgorithmKind>().unwrap(), kind);
    }
    for parameter in Parameter::ALL {
        assert_eq!(parameter.to_string().parse::<Parameter>().unwrap(), parameter);
    }
    assert_eq!("cacc".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::Cacc);
    assert!("pid".parse::<AlgorithmKind>().is_err());
    assert!("PID_P".parse::<Parameter>().is_err());
}

// --- Routes ---

#[test]
fn test_scripted_route_fires_on_schedule() {
    let mut route = ScriptedRoute::new([
        (2, Instruction::new(-1.0, 0.0)),
        (0, Instruction::new(1.0, 0.1)),
    ]);
    assert_eq!(route.next_step(), Some(Instruction::new(1.0, 0.1)));
    assert_eq!(route.next_step(), None);
    assert_eq!(route.next_step(), Some(Instruction::new(-1.0, 0.0)));
    assert!(route.is_finished());
    assert_eq!(route.next_step(), None);
    assert_eq!(Stationary.next_step(), None);
}

// --- Control loop ---

struct Rig {
    control: ControlLoop<MemoryTransport>,
    actuator: RecordingActuator,
    peer: MemoryTransport,
}

fn rig(
    vehicle_id: u32,
    order: &[u32],
    kind: AlgorithmKind,
    sensors: FixedSensors,
    beacons: Vec<Beacon>,
    config: Config,
) -> Rig {
    let medium = Medium::new(64, MAX);
    let peer = medium.attach();
    let coordinator = Coordinator::with_platoon(
        medium.attach(),
        Box::new(SequentialIds::starting_at(500)),
        config.clone(),
        vehicle_id,
        10,
        order,
    )
    .unwrap();
    let actuator = RecordingActuator::default();
    let control = ControlLoop::new(
        coordinator,
        Box::new(sensors),
        Box::new(FixedBeacons(beacons)),
        Box::new(actuator.clone()),
        Algorithm::new(kind),
        config,
    );
    Rig {
        control,
        actuator,
        peer,
    }
}

async fn inject(peer: &MemoryTransport, vehicle_id: u32, message: Message) {
    let bytes = Packet::new(10, vehicle_id, message).encode(MAX).unwrap();
    peer.send(bytes).await.unwrap();
}

async fn heard(peer: &MemoryTransport) -> Vec<Packet> {
    peer.poll()
        .await
        .unwrap()
        .into_iter()
        .map(|r| Packet::decode(&r.data, r.received_at, MAX).unwrap())
        .collect()
}

fn leader_state(speed: f64) -> Message {
    Message::VehicleState(VehicleState::steady(
        Motion::new(speed, 0.0, 0.0),
        Instant::now(),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_retained_message_boundary_age() {
    let mut rig = rig(
        2,
        &[1, 2],
        AlgorithmKind::DoNothing,
        FixedSensors::default(),
        Vec::new(),
        Config::default(),
    );
    let cancel = CancellationToken::new();

    inject(&rig.peer, 1, leader_state(10.0)).await;
    rig.control.tick(&cancel).await;
    assert!(rig.control.retained_message().is_some());

    advance(Duration::from_millis(200)).await;
    rig.control.tick(&cancel).await;
    assert!(
        rig.control.retained_message().is_some(),
        "an age of exactly 200 ms is kept"
    );

    advance(Duration::from_millis(1)).await;
    rig.control.tick(&cancel).await;
    assert!(rig.control.retained_message().is_none());
    assert_eq!(rig.control.state(), LoopState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_retained_message_needs_a_period_to_be_replaced() {
    let mut rig = rig(
        2,
        &[1, 2],
        AlgorithmKind::DoNothing,
        FixedSensors::default(),
        Vec::new(),
        Config::default(),
    );
    let cancel = CancellationToken::new();

    inject(&rig.peer, 1, leader_state(10.0)).await;
    rig.control.tick(&cancel).await;

    advance(Duration::from_millis(60)).await;
    inject(&rig.peer, 1, leader_state(11.0)).await;
    rig.control.tick(&cancel).await;
    assert_eq!(rig.control.retained_message().unwrap().actual.speed, 11.0);
}

#[tokio::test(start_paused = true)]
async fn test_follower_without_input_stops_once() {
    let mut rig = rig(
        2,
        &[1, 2],
        AlgorithmKind::Acc,
        FixedSensors::default(),
        Vec::new(),
        Config::default(),
    );
    let cancel = CancellationToken::new();

    rig.control.tick(&cancel).await;
    assert_eq!(rig.control.state(), LoopState::Emergency);
    assert_eq!(rig.actuator.commands(), vec![Command::Stop]);

    advance(Duration::from_millis(50)).await;
    rig.control.tick(&cancel).await;
    assert_eq!(rig.actuator.commands(), vec![Command::Stop]);

    let emergencies = heard(&rig.peer)
        .await
        .into_iter()
        .filter(|p| p.message == Message::Emergency)
        .count();
    assert_eq!(emergencies, 1);
}

#[tokio::test(start_paused = true)]
async fn test_emergency_stop_is_a_latch() {
    let mut rig = rig(
        1,
        &[1, 2],
        AlgorithmKind::Acc,
        FixedSensors::default(),
        Vec::new(),
        Config::default(),
    );

    rig.control.emergency_stop().await;
    rig.control.emergency_stop().await;

    assert_eq!(rig.actuator.stops(), 1);
    let packets = heard(&rig.peer).await;
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].message, Message::Emergency);
    assert_eq!(packets[0].vehicle_id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_follower_drives_from_sensor_and_broadcasts_choice() {
    let sensors = FixedSensors {
        speed: 0.0,
        acceleration: 0.0,
        turn_rate: 0.0,
        proximity: Some(1.2),
    };
    let beacon = Beacon {
        angle: 0.0,
        distance_lower_bound: 0.8,
    };
    let mut rig = rig(
        2,
        &[1, 2],
        AlgorithmKind::Acc,
        sensors,
        vec![beacon],
        Config::default(),
    );

    rig.control.tick(&CancellationToken::new()).await;

    // Beacon and proximity fuse to 1.0 m; 0.5 * (1.0 - 0.4) = 0.3.
    let commands = rig.actuator.commands();
    assert_eq!(commands.len(), 2);
    let Command::Acceleration(acceleration) = commands[0] else {
        panic!("expected an acceleration first, got {commands:?}");
    };
    assert_close(acceleration, 0.3);
    assert_eq!(commands[1], Command::TurnRate(0.0));

    let packets = heard(&rig.peer).await;
    let Message::VehicleState(sent) = packets[0].message else {
        panic!("expected a state broadcast");
    };
    assert_close(sent.chosen.acceleration, 0.3);
    assert_eq!(sent.actual, Motion::default());
}

#[tokio::test(start_paused = true)]
async fn test_leader_follows_route_and_broadcasts_actual() {
    let sensors = FixedSensors {
        speed: 5.0,
        acceleration: 0.25,
        turn_rate: 0.0,
        proximity: None,
    };
    let mut rig = rig(1, &[1, 2], AlgorithmKind::Acc, sensors, Vec::new(), Config::default());
    rig.control = rig
        .control
        .with_route(Box::new(ScriptedRoute::new([(0, Instruction::new(1.0, 0.1))])));

    let cancel = CancellationToken::new();
    rig.control.tick(&cancel).await;
    rig.control.tick(&cancel).await;

    assert_eq!(
        rig.actuator.commands(),
        vec![Command::Acceleration(1.0), Command::TurnRate(0.1)]
    );
    assert_eq!(rig.control.state(), LoopState::Running);

    let states: Vec<_> = heard(&rig.peer)
        .await
        .into_iter()
        .filter_map(|p| match p.message {
            Message::VehicleState(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|s| s.chosen == s.actual));
    assert_eq!(states[0].actual, Motion::new(5.0, 0.25, 0.0));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_routes_to_emergency() {
    let mut rig = rig(
        1,
        &[1],
        AlgorithmKind::Acc,
        FixedSensors::default(),
        Vec::new(),
        Config::default(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    rig.control.tick(&cancel).await;
    assert_eq!(rig.control.state(), LoopState::Emergency);
    assert_eq!(rig.actuator.commands(), vec![Command::Stop]);

    let packets = heard(&rig.peer).await;
    assert_eq!(packets.len(), 1, "no state broadcast after cancellation");
    assert_eq!(packets[0].message, Message::Emergency);
}

#[tokio::test(start_paused = true)]
async fn test_peer_emergency_halts_only_when_configured() {
    let mut config = Config::default();
    let sensors = FixedSensors {
        proximity: Some(1.0),
        ..FixedSensors::default()
    };

    let mut ignoring = rig(2, &[1, 2], AlgorithmKind::Acc, sensors, Vec::new(), config.clone());
    inject(&ignoring.peer, 1, Message::Emergency).await;
    ignoring.control.tick(&CancellationToken::new()).await;
    assert_eq!(ignoring.control.state(), LoopState::Running);

    config.control.halt_on_peer_emergency = true;
    let mut halting = rig(2, &[1, 2], AlgorithmKind::Acc, sensors, Vec::new(), config);
    inject(&halting.peer, 1, Message::Emergency).await;
    halting.control.tick(&CancellationToken::new()).await;
    assert_eq!(halting.control.state(), LoopState::Emergency);
    assert_eq!(halting.actuator.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_ticks_every_period_until_cancelled() {
    let mut rig = rig(
        1,
        &[1],
        AlgorithmKind::Acc,
        FixedSensors::default(),
        Vec::new(),
        Config::default(),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });

    rig.control.run(cancel).await;

    assert_eq!(rig.control.state(), LoopState::Emergency);
    assert_eq!(rig.actuator.stops(), 1);
    let packets = heard(&rig.peer).await;
    let states = packets
        .iter()
        .filter(|p| matches!(p.message, Message::VehicleState(_)))
        .count();
    assert_eq!(states, 3, "ticks at 0, 50 and 100 ms");
    assert_eq!(packets.last().unwrap().message, Message::Emergency);
}

/// Wraps a memory transport: the first poll stalls, and every send is timed.
#[derive(Debug)]
struct StallingTransport {
    inner: MemoryTransport,
    first_poll_stall: Mutex<Option<Duration>>,
    sent_at: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl Transport for StallingTransport {
    async fn send(&self, packet: Bytes) -> crate::error::Result<()> {
        self.sent_at.lock().unwrap().push(Instant::now());
        self.inner.send(packet).await
    }

    async fn poll(&self) -> crate::error::Result<Vec<Receipt>> {
        let stall = self.first_poll_stall.lock().unwrap().take();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        self.inner.poll().await
    }

    fn max_packet_size(&self) -> usize {
        self.inner.max_packet_size()
    }
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_tick_is_followed_at_once_without_catch_up() {
    let medium = Medium::new(64, MAX);
    let sent_at = Arc::new(Mutex::new(Vec::new()));
    let transport = StallingTransport {
        inner: medium.attach(),
        first_poll_stall: Mutex::new(Some(Duration::from_millis(70))),
        sent_at: sent_at.clone(),
    };
    let config = Config::default();
    let coordinator = Coordinator::with_platoon(
        transport,
        Box::new(SequentialIds::starting_at(500)),
        config.clone(),
        1,
        10,
        &[1],
    )
    .unwrap();
    let actuator = RecordingActuator::default();
    let mut control = ControlLoop::new(
        coordinator,
        Box::new(FixedSensors::default()),
        Box::new(FixedBeacons(Vec::new())),
        Box::new(actuator.clone()),
        Algorithm::new(AlgorithmKind::Acc),
        config,
    );

    let start = Instant::now();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(190)).await;
        trigger.cancel();
    });
    control.run(cancel).await;

    let offsets: Vec<u128> = sent_at
        .lock()
        .unwrap()
        .iter()
        .map(|t| (*t - start).as_millis())
        .collect();
    // The stalled tick broadcasts at 70 ms, the next tick follows right away,
    // then one tick per period resumes from there. The last send is the emergency.
    assert_eq!(offsets, vec![70, 70, 120, 170, 190]);
    assert_eq!(control.state(), LoopState::Emergency);
    assert_eq!(actuator.stops(), 1);
}
