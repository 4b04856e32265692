//! Tournament standings
//!
//! Computed on demand from enrollments and recorded match results; nothing
//! here is persisted.

use crate::models::{Enrollment, Match, MatchResult, User};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// One row of a standings table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Standing {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub points: f64,
    pub rating: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

/// Rank the players enrolled in one tournament
///
/// Ordered by points, then rating, then user id. Only matches with a played
/// result count towards wins, losses and draws.
pub fn compute(enrollments: &[Enrollment], matches: &[Match], users: &[User]) -> Vec<Standing> {
    let names: HashMap<i64, &User> = users.iter().map(|u| (u.id, u)).collect();

    let mut rows: HashMap<i64, Standing> = enrollments
        .iter()
        .map(|e| {
            let (first_name, last_name) = names
                .get(&e.user_id)
                .map(|u| (u.first_name.clone(), u.last_name.clone()))
                .unwrap_or_default();
            (
                e.user_id,
                Standing {
                    user_id: e.user_id,
                    first_name,
                    last_name,
                    points: 0.0,
                    rating: e.initial_rating,
                    wins: 0,
                    losses: 0,
                    draws: 0,
                },
            )
        })
        .collect();

    for game in matches {
        let Some(result) = game.result else { continue };
        let (white_points, black_points) = result.points();

        for (player, points) in [(game.white_id, white_points), (game.black_id, black_points)] {
            if let Some(row) = rows.get_mut(&player) {
                row.points += points;
                match result {
                    MatchResult::Draw => row.draws += 1,
                    MatchResult::NotPlayed => {}
                    _ if points > 0.0 => row.wins += 1,
                    _ => row.losses += 1,
                }
            }
        }
    }

    let mut table: Vec<Standing> = rows.into_values().collect();
    table.sort_by(|a, b| {
        b.points
            .total_cmp(&a.points)
            .then(b.rating.cmp(&a.rating))
            .then(a.user_id.cmp(&b.user_id))
    });
    table
}
