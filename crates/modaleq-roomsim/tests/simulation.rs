//! Properties of the modal simulator and its cache

use modaleq_roomsim::{
    MAX_FREQ, MIN_FREQ, ModalSimulator, ModeKind, Point3D, RoomDimensions, calculate_room_acoustics,
    room_modes, simulate,
};

fn rooms() -> Vec<(RoomDimensions, Point3D, Point3D)> {
    vec![
        (
            RoomDimensions::new(4.8, 4.8, 2.7),
            Point3D::new(0.38, 0.25, 0.83),
            Point3D::new(2.0, 3.70, 0.55),
        ),
        (
            RoomDimensions::new(7.2, 5.1, 3.0),
            Point3D::new(6.8, 0.4, 0.3),
            Point3D::new(3.1, 2.6, 1.1),
        ),
        (
            RoomDimensions::new(3.0, 2.5, 2.4),
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(1.5, 1.25, 1.2),
        ),
    ]
}

#[test]
fn test_grid_and_floor_for_several_rooms() {
    for (room, source, listener) in rooms() {
        let response = simulate(&source, &listener, &room, 10, 10.0);
        assert_eq!(response.len(), 281);
        assert_eq!(response.freq[0], MIN_FREQ);
        assert_eq!(response.freq[280], MAX_FREQ);
        assert!(response.spl.iter().all(|&db| db.is_finite() && db >= -100.0));
    }
}

#[test]
fn test_swapping_source_and_listener() {
    for (room, source, listener) in rooms() {
        let forward = simulate(&source, &listener, &room, 8, 10.0);
        let backward = simulate(&listener, &source, &room, 8, 10.0);
        assert_eq!(forward, backward);
    }
}

#[test]
fn test_cache_is_idempotent() {
    let simulator = ModalSimulator::new();
    for (room, source, listener) in rooms() {
        let first = simulator.simulate(&source, &listener, &room, 10, 10.0);
        let second = simulator.simulate(&source, &listener, &room, 10, 10.0);
        assert_eq!(first, second);
        assert_eq!(first, simulate(&source, &listener, &room, 10, 10.0));
    }
    assert_eq!(simulator.cache_stats().size, 3);
}

#[test]
fn test_cache_shared_between_threads() {
    let simulator = ModalSimulator::with_capacity(4);
    let (room, source, listener) = rooms().remove(0);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let response = simulator.simulate(&source, &listener, &room, 6, 10.0);
                assert_eq!(response.len(), 281);
            });
        }
    });
    assert_eq!(simulator.cache_stats().size, 1);
}

#[test]
fn test_modes_of_square_room() {
    let room = RoomDimensions::new(4.8, 4.8, 2.7);
    let modes = room_modes(&room, 100.0, 10);

    // (1,0,0) and (0,1,0) coincide in a square room
    let first = 343.0 / (2.0 * 4.8);
    assert!((modes[0].frequency - first).abs() < 1e-9);
    assert!((modes[1].frequency - first).abs() < 1e-9);
    assert_eq!(modes[0].kind, ModeKind::Axial);
    assert!(modes.iter().all(|m| m.frequency <= 100.0));

    let acoustics = calculate_room_acoustics(&room, 0.3);
    assert!(acoustics.schroeder_frequency > 50.0 && acoustics.schroeder_frequency < 300.0);
}
