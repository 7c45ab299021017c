//! Placeholder collection shown when the memory service cannot be reached.

use crate::models::{AccessState, Memory, MemoryId, RevealedKeyword, parse_created_at};

struct Placeholder {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    photo: &'static str,
    keyword: Option<&'static str>,
    created_at: &'static str,
}

const PLACEHOLDERS: [Placeholder; 5] = [
    Placeholder {
        id: "1",
        title: "Sunset Beach",
        description: "Warm breeze, pastel sky, first trip together.",
        photo: "photo-1507525428034-b723cf961d3e",
        keyword: None,
        created_at: "2024-01-15",
    },
    Placeholder {
        id: "2",
        title: "Picnic in the Park",
        description: "Blue blanket, polaroids, too many cherries.",
        photo: "photo-1506905925346-21bda4d32df4",
        keyword: None,
        created_at: "2024-02-20",
    },
    Placeholder {
        id: "3",
        title: "Grandma's Birthday",
        description: "Her laugh lit the whole room.",
        photo: "photo-1464349095431-e9a21285b5f3",
        keyword: Some("petals"),
        created_at: "2024-03-10",
    },
    Placeholder {
        id: "4",
        title: "Rainy City Stroll",
        description: "Neon reflections and shared umbrella.",
        photo: "photo-1519904981063-b0cf448d479e",
        keyword: None,
        created_at: "2024-04-05",
    },
    Placeholder {
        id: "5",
        title: "Slow Sunday",
        description: "Cinnamon coffee and soft jazz.",
        photo: "photo-1495474472287-4d71bcdd2085",
        keyword: Some("cinnamon"),
        created_at: "2024-05-12",
    },
];

/// Returns the fixed placeholder collection.
///
/// The result is identical on every call and never empty. Entries with a
/// keyword are presented as already unlocked.
#[must_use]
pub fn placeholder_collection() -> Vec<Memory> {
    PLACEHOLDERS
        .iter()
        .map(|p| Memory {
            id: MemoryId::from_static(p.id),
            title: p.title.to_string(),
            description: p.description.to_string(),
            image_url: Some(format!(
                "https://images.unsplash.com/{}?w=400&h=300&fit=crop",
                p.photo
            )),
            access_state: match p.keyword {
                Some(keyword) => AccessState::Unlocked {
                    revealed_keyword: RevealedKeyword::new(keyword),
                },
                None => AccessState::Locked,
            },
            created_at: parse_created_at(p.created_at).unwrap_or_default(),
            owner: None,
        })
        .collect()
}
