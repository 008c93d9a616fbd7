use crate::player::Player;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use soccer_shared::config::GameConfig;
use soccer_shared::vec2::Vec2;
use std::collections::BTreeMap;

/// Owns every connected player and hands out ids.
///
/// Players are kept in id order so simulation passes are deterministic.
/// Capacity is enforced by the connection gateway, not here.
pub struct SessionRegistry {
    players: BTreeMap<u32, Player>,
    next_player_id: u32,
    /// Spawn area: player centres stay a radius away from every edge
    spawn_min: Vec2,
    spawn_max: Vec2,
    rng: ChaCha8Rng,
}

impl SessionRegistry {
    pub fn new(config: &GameConfig, rng_seed: u64) -> Self {
        let r = config.player.radius;
        Self {
            players: BTreeMap::new(),
            next_player_id: 0,
            spawn_min: Vec2::new(r, r),
            spawn_max: Vec2::new(config.field.width - r, config.field.height - r),
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
        }
    }

    /// Add a player at a random spot on the field. Ids are never reused.
    pub fn create_player(&mut self) -> &Player {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let pos = Vec2::new(
            self.rng.gen_range(self.spawn_min.x..=self.spawn_max.x),
            self.rng.gen_range(self.spawn_min.y..=self.spawn_max.y),
        );

        self.players.entry(id).or_insert(Player::new(id, pos))
    }

    /// Remove a player. Removing an unknown id is a bug in the caller.
    pub fn remove_player(&mut self, id: u32) -> Option<Player> {
        let removed = self.players.remove(&id);
        debug_assert!(removed.is_some(), "removed unknown player {}", id);
        removed
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> &BTreeMap<u32, Player> {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut BTreeMap<u32, Player> {
        &mut self.players
    }

    /// Number of live players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Team;
    use soccer_shared::protocol::Controls;

    fn test_registry() -> SessionRegistry {
        SessionRegistry::new(&GameConfig::default(), 12345)
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut registry = test_registry();
        let a = registry.create_player().id;
        let b = registry.create_player().id;
        registry.remove_player(a);
        let c = registry.create_player().id;
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn live_count_tracks_create_and_remove() {
        let mut registry = test_registry();
        assert!(registry.is_empty());
        let a = registry.create_player().id;
        registry.create_player();
        assert_eq!(registry.len(), 2);
        assert!(registry.remove_player(a).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(a).is_none());
    }

    #[test]
    fn teams_follow_id_parity() {
        let mut registry = test_registry();
        let teams: Vec<Team> = (0..4).map(|_| registry.create_player().team).collect();
        assert_eq!(teams, vec![Team::Red, Team::Blue, Team::Red, Team::Blue]);
    }

    #[test]
    fn players_spawn_inside_field_at_rest() {
        let config = GameConfig::default();
        let mut registry = SessionRegistry::new(&config, 7);
        for _ in 0..200 {
            let p = registry.create_player();
            let r = config.player.radius;
            assert!(p.pos.x >= r && p.pos.x <= config.field.width - r);
            assert!(p.pos.y >= r && p.pos.y <= config.field.height - r);
            assert_eq!(p.vel, Vec2::ZERO);
            assert_eq!(p.controls, Controls::default());
        }
    }

    #[test]
    fn same_seed_same_spawns() {
        let mut a = test_registry();
        let mut b = test_registry();
        assert_eq!(a.create_player().pos, b.create_player().pos);
    }

    #[test]
    fn players_iterate_in_id_order() {
        let mut registry = test_registry();
        for _ in 0..5 {
            registry.create_player();
        }
        registry.remove_player(2);
        let ids: Vec<u32> = registry.players().keys().copied().collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
    }
}
