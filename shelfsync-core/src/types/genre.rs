//! Browsable genres

use serde::Serialize;

/// A browsable catalog category
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Genre {
    /// Identifier used for the genre cache
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Subject slug understood by the remote catalog
    pub subject: &'static str,
}

/// Genres offered for browsing
pub const GENRES: &[Genre] = &[
    Genre {
        id: "fiction",
        name: "Fiction",
        description: "Novels and short fiction",
        subject: "fiction",
    },
    Genre {
        id: "science",
        name: "Science",
        description: "Popular science",
        subject: "science",
    },
    Genre {
        id: "history",
        name: "History",
        description: "History and historical events",
        subject: "history",
    },
    Genre {
        id: "fantasy",
        name: "Fantasy",
        description: "Magical worlds and epic adventures",
        subject: "fantasy",
    },
];

impl Genre {
    /// Look up a genre by id (case-insensitive)
    pub fn find(id: &str) -> Option<&'static Genre> {
        GENRES.iter().find(|g| g.id.eq_ignore_ascii_case(id.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_genre() {
        assert_eq!(Genre::find("Fantasy").map(|g| g.subject), Some("fantasy"));
        assert!(Genre::find("cooking").is_none());
    }
}
