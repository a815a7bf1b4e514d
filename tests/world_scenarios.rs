use glam::Vec2;
use tilebonk::{
    Collidable, ColliderRegion, ColliderSimple, CollisionState, CollisionWorld, CollisionWorldApi, ColliderTileMap,
    ContactType, Rect, TileShape, WorldConfig,
};

fn cfg() -> WorldConfig {
    WorldConfig { dt: 1.0 / 60.0, ..Default::default() }
}

fn map_with(tiles: &[((i32, i32), &str)]) -> ColliderTileMap {
    let mut map = ColliderTileMap::new(8, 8, false).unwrap();
    for &(at, shape) in tiles {
        map.set_tile(at, shape.parse::<TileShape>().unwrap());
    }
    map.apply_changes();
    map
}

#[test]
fn test_falling_body_lands_with_single_contact() {
    let mut w = CollisionWorld::new(cfg()).unwrap();
    w.add_region(Box::new(map_with(&[((1, 4), "solid"), ((2, 4), "solid")])));

    // straddles the seam between the two floor tiles, bottom 10px above y = 64
    let mut body = Collidable::new(Vec2::new(32.0, 54.0), Vec2::new(16.0, 16.0)).unwrap();
    body.set_vel(Vec2::new(0.0, 300.0));
    let id = w.add_collidable(body);

    let mut ticks = 0;
    while w.frame(id).unwrap().contacts.is_empty() {
        assert!(ticks < 4, "body never reached the floor");
        w.step();
        ticks += 1;
    }

    let frame = w.frame(id).unwrap();
    assert_eq!(frame.contacts.len(), 1);
    let applied = &frame.contacts[0];
    assert_eq!(applied.kind, ContactType::Single);
    assert_eq!(applied.contact.ortho_n, Vec2::new(0.0, -1.0));
    assert_eq!(applied.precontact_velocity, Vec2::new(0.0, 300.0));

    let body = w.collidable(id).unwrap();
    assert!((body.position().y - 64.0).abs() < 1e-3);
    assert_eq!(body.vel().y, 0.0);
    assert!(body.has_state(CollisionState::FLOOR));
}

#[test]
fn test_squeezed_body_is_crushed_vertically() {
    let mut w = CollisionWorld::new(cfg()).unwrap();
    w.add_region(Box::new(map_with(&[((2, 2), "solid"), ((2, 4), "solid")])));

    // 3px into the floor, 1px into the ceiling
    let body = Collidable::new(Vec2::new(40.0, 67.0), Vec2::new(8.0, 20.0)).unwrap();
    let id = w.add_collidable(body);
    w.step();

    let frame = w.frame(id).unwrap();
    assert_eq!(frame.contacts.len(), 1);
    assert_eq!(frame.contacts[0].kind, ContactType::CrushVertical);

    let body = w.collidable(id).unwrap();
    assert_eq!(body.vel().y, 0.0);
    assert!(body.has_state(CollisionState::CRUSH_V));
    // overlap split evenly between floor and ceiling
    assert!((body.position().y - 66.0).abs() < 1e-3);
    assert!((body.rect().top - 46.0).abs() < 1e-3);
}

#[test]
fn test_one_way_only_catches_from_above() {
    let map = || map_with(&[((2, 4), "oneway")]);

    // rising through the platform from below
    let mut w = CollisionWorld::new(cfg()).unwrap();
    w.add_region(Box::new(map()));
    let mut body = Collidable::new(Vec2::new(40.0, 70.0), Vec2::new(8.0, 8.0)).unwrap();
    body.set_vel(Vec2::new(0.0, -240.0));
    let id = w.add_collidable(body);
    w.step();
    assert!(w.frame(id).unwrap().contacts.is_empty());
    assert!((w.collidable(id).unwrap().position().y - 66.0).abs() < 1e-3);

    // falling onto it from above
    let mut w = CollisionWorld::new(cfg()).unwrap();
    w.add_region(Box::new(map()));
    let mut body = Collidable::new(Vec2::new(40.0, 62.0), Vec2::new(8.0, 8.0)).unwrap();
    body.set_vel(Vec2::new(0.0, 240.0));
    let id = w.add_collidable(body);
    w.step();
    let frame = w.frame(id).unwrap();
    assert_eq!(frame.contacts.len(), 1);
    assert_eq!(frame.contacts[0].contact.ortho_n, Vec2::new(0.0, -1.0));
    assert!((w.collidable(id).unwrap().position().y - 64.0).abs() < 1e-3);
}

#[test]
fn test_runs_are_deterministic() {
    let run = || {
        let mut w = CollisionWorld::new(cfg()).unwrap();
        w.add_region(Box::new(map_with(&[
            ((0, 5), "solid"),
            ((1, 5), "solid"),
            ((2, 5), "slope"),
            ((2, 6), "solid"),
            ((3, 6), "solid"),
            ((4, 6), "shallow1-h"),
            ((5, 6), "shallow2-h"),
            ((4, 2), "oneway"),
        ])));
        let body = Collidable::new(Vec2::new(12.0, 70.0), Vec2::new(8.0, 12.0))
            .unwrap()
            .with_gravity(Vec2::new(0.0, 600.0));
        let id = w.add_collidable(body);

        let mut frames = Vec::new();
        for tick in 0..120 {
            if let Some(body) = w.collidable_mut(id) {
                body.add_accel(Vec2::new(if tick < 60 { 400.0 } else { -400.0 }, 0.0));
            }
            w.step();
            frames.push(w.frame(id).unwrap().clone());
        }
        (frames, w.collidable(id).unwrap().position())
    };

    let (a, pos_a) = run();
    let (b, pos_b) = run();
    assert_eq!(format!("{a:?}"), format!("{b:?}"));
    assert_eq!(pos_a, pos_b);
}

#[test]
fn test_tile_edit_between_steps_catches_body() {
    let mut w = CollisionWorld::new(cfg()).unwrap();
    let rid = w.add_region(Box::new(map_with(&[])));
    let mut body = Collidable::new(Vec2::new(40.0, 40.0), Vec2::new(8.0, 8.0)).unwrap();
    body.set_vel(Vec2::new(0.0, 120.0));
    let id = w.add_collidable(body);

    for _ in 0..3 {
        w.step();
        assert!(w.frame(id).unwrap().contacts.is_empty());
    }

    let map = w.region_as_mut::<ColliderTileMap>(rid).unwrap();
    map.set_tile((2, 4), TileShape::SOLID);
    // queued until the region updates at the start of the next step
    assert!(w.region_as::<ColliderTileMap>(rid).unwrap().quad_at((2, 4)).is_none());
    assert!(w.region_as::<ColliderSimple>(rid).is_none());

    let mut ticks = 0;
    while w.frame(id).unwrap().contacts.is_empty() {
        assert!(ticks < 20, "body fell past the new tile");
        w.step();
        ticks += 1;
    }
    assert!(w.region_as::<ColliderTileMap>(rid).unwrap().quad_at((2, 4)).is_some());

    let body = w.collidable(id).unwrap();
    assert!((body.position().y - 64.0).abs() < 1e-3);
    assert!(body.has_state(CollisionState::FLOOR));
}

#[test]
fn test_rising_platform_carries_body() {
    let dt = cfg().dt;
    let rise = Vec2::new(0.0, -60.0);

    let mut w = CollisionWorld::new(cfg()).unwrap();
    let mut platform = ColliderSimple::new(Rect::new(0.0, 0.0, 64.0, 16.0));
    platform.teleport(Vec2::new(0.0, 100.0));
    platform.set_velocity(rise);
    let rid = w.add_region(Box::new(platform));

    let body = Collidable::new(Vec2::new(32.0, 100.0), Vec2::new(8.0, 16.0))
        .unwrap()
        .with_gravity(Vec2::new(0.0, 600.0));
    let id = w.add_collidable(body);

    for _ in 0..30 {
        let platform = w.region_as_mut::<ColliderSimple>(rid).unwrap();
        let next = platform.position() + rise * dt;
        platform.set_position(next);
        w.step();

        let top = w.region(rid).unwrap().position().y;
        let body = w.collidable(id).unwrap();
        assert!((body.position().y - top).abs() < 1e-3);
        assert!(body.has_state(CollisionState::FLOOR));
        assert!((body.vel().y - rise.y).abs() < 1e-3);
    }
    assert!((w.region(rid).unwrap().position().y - 70.0).abs() < 1e-2);
}
