// Copyright 2026 the Quilt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end frame loop tests against the simulated device.

use std::cell::RefCell;
use std::f64::consts::FRAC_PI_2;
use std::rc::Rc;

use kurbo::{Rect, Size};
use quilt_core::error::SessionError;
use quilt_core::event::SessionEvent;
use quilt_core::feature::{Feature, FeatureSet, SessionInit};
use quilt_core::frame::{Eye, ViewerPose};
use quilt_core::input::{Handedness, InputAction, InputSource, InputSourceId, TargetRayMode};
use quilt_core::multiview::{MultiViewConfig, TrackedPose};
use quilt_core::reference::{ReferenceSpace, ReferenceSpaceType};
use quilt_core::render_state::{RenderStatePatch, SurfaceId};
use quilt_core::runtime::Runtime;
use quilt_core::session::{SessionId, SessionMode, SessionState};
use quilt_core::time::HostTime;
use quilt_core::transform::Transform3d;
use quilt_sim::{DEFAULT_FRAME_INTERVAL, DEFAULT_IPD, InputPoses, SimDevice, pump, pump_frames};

const EPS: f64 = 1e-9;

fn close(a: [f64; 3], b: [f64; 3]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < EPS)
}

fn open(
    rt: &mut Runtime<SimDevice>,
    mode: SessionMode,
    optional: FeatureSet,
    surface: u32,
    size: Size,
) -> SessionId {
    let init = SessionInit {
        optional_features: optional,
        ..SessionInit::default()
    };
    let id = rt.request_session(mode, &init).unwrap();
    rt.device_mut().add_surface(SurfaceId(surface), size);
    let target = rt.create_render_target(id, SurfaceId(surface)).unwrap();
    rt.session_mut(id)
        .unwrap()
        .update_render_state(RenderStatePatch::default().target(target))
        .unwrap();
    id
}

/// Queues one callback that stores the viewer pose and viewports it sees.
fn capture(
    rt: &mut Runtime<SimDevice>,
    id: SessionId,
    reference: ReferenceSpace,
) -> Rc<RefCell<Option<(Option<ViewerPose>, Vec<Option<Rect>>)>>> {
    let seen = Rc::new(RefCell::new(None));
    let out = seen.clone();
    rt.session_mut(id)
        .unwrap()
        .request_animation_frame(move |_, frame| {
            let pose = frame.viewer_pose(&reference)?;
            let viewports = match &pose {
                Some(p) => p
                    .views
                    .iter()
                    .map(|v| frame.viewport(v))
                    .collect::<Result<Vec<_>, SessionError>>()?,
                None => Vec::new(),
            };
            *out.borrow_mut() = Some((pose, viewports));
            Ok(())
        })
        .unwrap();
    seen
}

fn event_log(rt: &mut Runtime<SimDevice>, id: SessionId) -> Rc<RefCell<Vec<&'static str>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    rt.session_mut(id).unwrap().add_event_listener(move |e, _| {
        sink.borrow_mut().push(e.name());
        Ok(())
    });
    log
}

#[test]
fn inline_frames_follow_the_head() {
    let mut rt = Runtime::new(SimDevice::new());
    rt.device_mut()
        .set_head(Some(Transform3d::from_translation(0.5, 0.0, -1.0)));
    let local = FeatureSet::default().with(Feature::Local);
    let id = open(&mut rt, SessionMode::Inline, local, 1, Size::new(800.0, 600.0));
    let space = rt
        .request_reference_space(id, ReferenceSpaceType::Local)
        .unwrap();
    let seen = capture(&mut rt, id, space);

    pump(&mut rt);

    let (pose, viewports) = seen.borrow_mut().take().expect("callback ran");
    let pose = pose.expect("tracked");
    assert!(close(pose.pose.transform.position(), [0.5, 0.0, -1.0]), "{pose:?}");
    assert_eq!(pose.views.len(), 1);
    assert_eq!(pose.views[0].eye, Eye::None);
    assert_eq!(viewports, [Some(Rect::new(0.0, 0.0, 800.0, 600.0))]);

    let expected = Transform3d::perspective(FRAC_PI_2, 800.0 / 600.0, 0.1, 1000.0);
    assert!(
        pose.views[0].projection.approx_eq(&expected, EPS),
        "inline projection uses the surface aspect"
    );
}

#[test]
fn callbacks_receive_device_time() {
    let mut rt = Runtime::new(SimDevice::new());
    let id = open(
        &mut rt,
        SessionMode::Inline,
        FeatureSet::default(),
        1,
        Size::new(100.0, 100.0),
    );
    let times = Rc::new(RefCell::new(Vec::new()));
    for _ in 0..2 {
        let t = times.clone();
        rt.session_mut(id)
            .unwrap()
            .request_animation_frame(move |now, _| {
                t.borrow_mut().push(now);
                Ok(())
            })
            .unwrap();
        pump(&mut rt);
    }
    assert_eq!(
        *times.borrow(),
        [
            HostTime(DEFAULT_FRAME_INTERVAL),
            HostTime(2 * DEFAULT_FRAME_INTERVAL)
        ]
    );
    assert_eq!(rt.session(id).unwrap().frame_count(), 2);
    assert!(
        rt.device().frames().iter().all(|f| f.ended),
        "every started frame ended"
    );
}

#[test]
fn stereo_views_relative_to_the_floor() {
    let mut rt = Runtime::new(SimDevice::new());
    let floor = FeatureSet::default().with(Feature::LocalFloor);
    let id = open(
        &mut rt,
        SessionMode::ImmersiveVr,
        floor,
        1,
        Size::new(1600.0, 800.0),
    );
    let space = rt
        .request_reference_space(id, ReferenceSpaceType::LocalFloor)
        .unwrap();
    let seen = capture(&mut rt, id, space);

    pump(&mut rt);

    let (pose, viewports) = seen.borrow_mut().take().expect("callback ran");
    let pose = pose.expect("tracked");
    assert!(close(pose.pose.transform.position(), [0.0, 1.6, 0.0]), "{pose:?}");
    let eyes: Vec<_> = pose.views.iter().map(|v| v.eye).collect();
    assert_eq!(eyes, [Eye::Left, Eye::Right]);
    assert!(
        close(pose.views[0].transform.position(), [-DEFAULT_IPD / 2.0, 1.6, 0.0]),
        "left eye: {:?}",
        pose.views[0]
    );
    assert!(
        close(pose.views[1].transform.position(), [DEFAULT_IPD / 2.0, 1.6, 0.0]),
        "right eye: {:?}",
        pose.views[1]
    );
    assert_eq!(
        viewports,
        [
            Some(Rect::new(0.0, 0.0, 800.0, 800.0)),
            Some(Rect::new(800.0, 0.0, 1600.0, 800.0)),
        ]
    );
}

#[test]
fn light_field_views_tile_the_quilt() {
    let config = MultiViewConfig::default();
    let mut rt = Runtime::new(SimDevice::light_field(config));
    let id = open(
        &mut rt,
        SessionMode::ImmersiveVr,
        FeatureSet::default(),
        1,
        Size::new(3360.0, 3360.0),
    );
    let local = rt
        .request_reference_space(id, ReferenceSpaceType::Local)
        .unwrap();
    let seen = capture(&mut rt, id, local);

    pump(&mut rt);

    let (pose, viewports) = seen.borrow_mut().take().expect("callback ran");
    let pose = pose.expect("tracked");
    assert_eq!(pose.views.len(), 48);
    assert_eq!(rt.device().frames().last().map(|f| f.views), Some(48));
    assert_eq!(viewports[0], Some(Rect::new(0.0, 0.0, 420.0, 560.0)));
    assert_eq!(viewports[9], Some(Rect::new(420.0, 560.0, 840.0, 1120.0)));

    let first = pose.views[0].transform.position();
    let last = pose.views[47].transform.position();
    assert!((first[0] + last[0]).abs() < EPS, "mirrored offsets: {first:?} {last:?}");
    assert!(first[0] < 0.0, "view 0 on the left");
    assert!((first[2] - last[2]).abs() < EPS, "common baseline");

    let skew = |i: usize| pose.views[i].projection.col(2)[0];
    assert!((skew(0) + skew(47)).abs() < EPS, "mirrored frusta");
    assert!(skew(0).abs() > EPS, "outer views are off-axis");
}

#[test]
fn light_field_cameras_follow_the_tracked_pose() {
    let mut rt = Runtime::new(SimDevice::light_field(MultiViewConfig::default()));
    let id = open(
        &mut rt,
        SessionMode::ImmersiveVr,
        FeatureSet::default(),
        1,
        Size::new(3360.0, 3360.0),
    );
    let local = rt
        .request_reference_space(id, ReferenceSpaceType::Local)
        .unwrap();
    let before = capture(&mut rt, id, local);
    pump(&mut rt);

    rt.device_mut().set_tracked_pose(TrackedPose {
        target: [1.0, 0.0, 0.0],
        ..TrackedPose::default()
    });
    let after = capture(&mut rt, id, local);
    pump(&mut rt);

    let x = |seen: &Rc<RefCell<Option<(Option<ViewerPose>, Vec<Option<Rect>>)>>>| {
        let (pose, _) = seen.borrow_mut().take().expect("callback ran");
        pose.expect("tracked").pose.transform.position()[0]
    };
    let moved = x(&after) - x(&before);
    assert!((moved - 1.0).abs() < EPS, "array moved with the target: {moved}");
}

#[test]
fn inline_light_field_preview_sits_at_eye_height() {
    let mut rt = Runtime::new(SimDevice::light_field(MultiViewConfig::default()));
    let local = FeatureSet::default().with(Feature::Local);
    let id = open(&mut rt, SessionMode::Inline, local, 1, Size::new(1536.0, 2048.0));
    let space = rt
        .request_reference_space(id, ReferenceSpaceType::Local)
        .unwrap();
    let seen = capture(&mut rt, id, space);

    pump(&mut rt);

    let (pose, viewports) = seen.borrow_mut().take().expect("callback ran");
    let pose = pose.expect("tracked");
    assert!(
        close(pose.pose.transform.position(), [0.0, 1.6, 0.0]),
        "viewer at eye height: {pose:?}"
    );
    assert_eq!(pose.views.len(), 1, "inline renders one view");
    assert!(
        close(pose.views[0].transform.position(), [0.0, 1.6, 0.0]),
        "view follows the viewer"
    );
    assert_eq!(viewports, [Some(Rect::new(0.0, 0.0, 1536.0, 2048.0))]);

    let expected = Transform3d::perspective(FRAC_PI_2, 1536.0 / 2048.0, 0.1, 1000.0);
    assert!(
        pose.views[0].projection.approx_eq(&expected, EPS),
        "symmetric inline projection"
    );
    assert_eq!(pose.views[0].projection.col(2)[0], 0.0, "no horizontal skew");
}

#[test]
fn immersive_session_suspends_inline_sessions() {
    let mut rt = Runtime::new(SimDevice::new());
    let inline = open(
        &mut rt,
        SessionMode::Inline,
        FeatureSet::default(),
        1,
        Size::new(100.0, 100.0),
    );
    let log = event_log(&mut rt, inline);
    let immersive = open(
        &mut rt,
        SessionMode::ImmersiveVr,
        FeatureSet::default(),
        2,
        Size::new(200.0, 100.0),
    );
    assert_eq!(rt.session(inline).unwrap().state(), SessionState::Suspended);
    assert_eq!(*log.borrow(), ["blur"]);

    pump_frames(&mut rt, 3);
    assert!(
        rt.device().frames().iter().all(|f| f.session == immersive),
        "only the immersive session renders"
    );
    assert_eq!(rt.session(inline).unwrap().tick_count(), 0);

    rt.end_session(immersive).unwrap();
    assert_eq!(*log.borrow(), ["blur", "focus"]);
    pump(&mut rt);
    assert_eq!(rt.session(inline).unwrap().tick_count(), 1);
    assert_eq!(rt.device().ended_sessions(), [immersive]);
}

#[test]
fn select_is_routed_with_an_input_frame() {
    let mut rt = Runtime::new(SimDevice::new());
    let local = FeatureSet::default().with(Feature::Local);
    let id = open(&mut rt, SessionMode::Inline, local, 1, Size::new(100.0, 100.0));
    let space = rt
        .request_reference_space(id, ReferenceSpaceType::Local)
        .unwrap();
    let source = InputSourceId(7);
    rt.device_mut().connect(
        InputSource::new(source, Handedness::Right, TargetRayMode::TrackedPointer),
        InputPoses {
            target_ray: Transform3d::from_translation(0.2, 1.0, -0.3),
            grip: Some(Transform3d::from_translation(0.2, 0.9, -0.2)),
        },
    );

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    rt.session_mut(id)
        .unwrap()
        .add_event_listener(move |event, frame| {
            let position = match (event, frame) {
                (SessionEvent::Select { .. }, Some(frame)) => {
                    let ray = frame.session().input_sources()[0].target_ray_space();
                    frame
                        .pose(&ray, &space)?
                        .map(|p| p.transform.position())
                }
                _ => None,
            };
            sink.borrow_mut().push((event.name(), position));
            Ok(())
        });

    pump(&mut rt);
    assert_eq!(*log.borrow(), [("inputsourceschange", None)]);
    let tracked = rt.session(id).unwrap().input_sources();
    assert_eq!(tracked.len(), 1);
    assert!(tracked[0].grip_space().is_some(), "tracked pointers have a grip");

    rt.device_mut().press(id, source, InputAction::Select);
    rt.device_mut().release(id, source, InputAction::Select);
    pump(&mut rt);

    let log = log.borrow();
    let names: Vec<_> = log.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, ["inputsourceschange", "selectstart", "selectend", "select"]);
    let position = log[3].1.expect("ray located");
    assert!(close(position, [0.2, 1.0, -0.3]), "{position:?}");
}

#[test]
fn disconnecting_a_source_removes_it() {
    let mut rt = Runtime::new(SimDevice::new());
    let id = open(
        &mut rt,
        SessionMode::Inline,
        FeatureSet::default(),
        1,
        Size::new(100.0, 100.0),
    );
    let gaze = InputSource::new(InputSourceId(1), Handedness::None, TargetRayMode::Gaze);
    rt.device_mut().connect(
        gaze,
        InputPoses {
            target_ray: Transform3d::IDENTITY,
            grip: None,
        },
    );
    pump(&mut rt);
    assert!(
        rt.session(id).unwrap().input_sources()[0]
            .grip_space()
            .is_none(),
        "gaze has no grip"
    );
    rt.device_mut().disconnect(InputSourceId(1));
    pump(&mut rt);
    assert!(rt.session(id).unwrap().input_sources().is_empty(), "removed");
}

#[test]
fn device_termination_ends_the_session() {
    let mut rt = Runtime::new(SimDevice::new());
    let id = open(
        &mut rt,
        SessionMode::ImmersiveAr,
        FeatureSet::default(),
        1,
        Size::new(100.0, 100.0),
    );
    let log = event_log(&mut rt, id);
    let ran = Rc::new(RefCell::new(false));
    let flag = ran.clone();
    rt.session_mut(id)
        .unwrap()
        .request_animation_frame(move |_, _| {
            *flag.borrow_mut() = true;
            Ok(())
        })
        .unwrap();

    rt.device_mut().terminate(id);
    pump(&mut rt);

    assert!(!*ran.borrow(), "no frame after termination");
    assert_eq!(*log.borrow(), ["end"]);
    let session = rt.session_mut(id).unwrap();
    assert_eq!(session.state(), SessionState::Ended);
    assert!(
        matches!(
            session.request_animation_frame(|_, _| Ok(())),
            Err(SessionError::SessionEnded)
        ),
        "ended sessions reject callbacks"
    );
    assert_eq!(rt.device().ended_sessions(), [id]);
    assert_eq!(rt.device().armed_ticks(), 0);
}

#[test]
fn reference_space_availability() {
    let mut rt = Runtime::new(SimDevice::new());
    let all = FeatureSet::default()
        .with(Feature::BoundedFloor)
        .with(Feature::Unbounded);
    let id = open(
        &mut rt,
        SessionMode::ImmersiveVr,
        all,
        1,
        Size::new(100.0, 100.0),
    );
    assert!(
        matches!(
            rt.request_reference_space(id, ReferenceSpaceType::Unbounded),
            Err(SessionError::TransformDeclined(ReferenceSpaceType::Unbounded))
        ),
        "the device declines unbounded"
    );
    assert!(
        matches!(
            rt.request_reference_space(id, ReferenceSpaceType::BoundedFloor),
            Err(SessionError::BoundedFloorUnavailable)
        ),
        "bounds are not modeled"
    );
    assert!(
        matches!(
            rt.request_reference_space(id, ReferenceSpaceType::LocalFloor),
            Err(SessionError::UnsupportedReferenceSpace(
                ReferenceSpaceType::LocalFloor
            ))
        ),
        "local-floor was not requested"
    );
}

#[test]
fn lost_tracking_yields_no_pose() {
    let mut rt = Runtime::new(SimDevice::new());
    let id = open(
        &mut rt,
        SessionMode::Inline,
        FeatureSet::default(),
        1,
        Size::new(100.0, 100.0),
    );
    rt.device_mut().set_head(None);
    let viewer = rt.session(id).unwrap().viewer_space();
    let seen = capture(&mut rt, id, viewer);
    pump(&mut rt);
    let (pose, viewports) = seen.borrow_mut().take().expect("callback ran");
    assert!(pose.is_none(), "no pose without tracking");
    assert!(viewports.is_empty(), "no views");
}

#[test]
fn unsupported_immersive_mode_is_rejected() {
    let mut rt = Runtime::new(SimDevice::new());
    rt.device_mut().set_immersive_supported(false);
    assert!(!rt.is_session_supported(SessionMode::ImmersiveAr), "unsupported");
    assert!(
        matches!(
            rt.request_session(SessionMode::ImmersiveAr, &SessionInit::default()),
            Err(SessionError::UnsupportedMode(SessionMode::ImmersiveAr))
        ),
        "rejected"
    );
    assert!(rt.is_session_supported(SessionMode::Inline), "inline always works");
}
