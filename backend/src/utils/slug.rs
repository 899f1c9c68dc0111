use std::sync::LazyLock;

use regex::Regex;
use sqlx::SqlitePool;

use crate::error::AppError;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));

/// Folds common Latin accents to their base letter ("João" -> "joao").
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Lowercases, strips accents and collapses every non-alphanumeric run to '-'.
pub fn slugify(name: &str) -> String {
    let folded: String = name.to_lowercase().chars().map(fold_accent).collect();
    let slug = NON_ALNUM.replace_all(&folded, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        "reader".to_string()
    } else {
        slug.to_string()
    }
}

/// Finds a free slug for `name`, appending `-1`, `-2`, ... on collision.
/// `exclude_user` lets a user keep their own slug while editing the profile.
pub async fn unique_slug(
    pool: &SqlitePool,
    name: &str,
    exclude_user: Option<i64>,
) -> Result<String, AppError> {
    let base = slugify(name);
    let mut candidate = base.clone();
    let mut counter = 0;

    loop {
        let taken: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE slug = ?1 AND id != ?2")
                .bind(&candidate)
                .bind(exclude_user.unwrap_or(0))
                .fetch_optional(pool)
                .await?;

        if taken.is_none() {
            return Ok(candidate);
        }

        counter += 1;
        candidate = format!("{}-{}", base, counter);
    }
}
