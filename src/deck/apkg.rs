//! Reading and writing Anki package files.
//!
//! A package is a zip archive with two entries: `collection.anki2`, a SQLite
//! collection, and `media`, a JSON map of bundled media files (always empty here).

use super::schema::{self, DEFAULT_DECK_ID, FIELD_SEPARATOR, SCHEMA_VERSION};
use crate::domain::{Deck, DeckCard, Flashcard};
use crate::error::{Error, Result};
use crate::utils::stable_hash_u64;
use rusqlite::{params, Connection, OpenFlags};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const COLLECTION_ENTRY: &str = "collection.anki2";
const MEDIA_ENTRY: &str = "media";

const GUID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Write `deck` to `path` as an `.apkg`, replacing any existing file.
pub fn serialize(deck: &Deck, path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let scratch = tempfile::tempdir().map_err(|e| Error::io(path, e))?;
    let collection_path = scratch.path().join(COLLECTION_ENTRY);
    write_collection(deck, &collection_path)?;
    let collection = fs::read(&collection_path).map_err(|e| Error::io(&collection_path, e))?;

    let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    {
        let mut zip = ZipWriter::new(staged.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(COLLECTION_ENTRY, options).map_err(|e| Error::io_other(path, e))?;
        zip.write_all(&collection).map_err(|e| Error::io(path, e))?;
        zip.start_file(MEDIA_ENTRY, options).map_err(|e| Error::io_other(path, e))?;
        zip.write_all(b"{}").map_err(|e| Error::io(path, e))?;
        zip.finish().map_err(|e| Error::io_other(path, e))?;
    }
    staged.as_file().sync_all().map_err(|e| Error::io(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o644))
            .map_err(|e| Error::io(staged.path(), e))?;
    }

    staged.persist(path).map_err(|e| Error::io(path, e.error))?;
    debug!(path = %path.display(), cards = deck.len(), "Wrote deck package");
    Ok(())
}

fn write_collection(deck: &Deck, db_path: &Path) -> Result<()> {
    let sql_err = |e: rusqlite::Error| Error::io_other(db_path, e);
    let json_err = |e: serde_json::Error| Error::io_other(db_path, e);

    let now = chrono::Utc::now();
    let now_secs = now.timestamp();
    let now_ms = now.timestamp_millis();
    let deck_id = deck_id_for(&deck.name);
    let model_id = model_id();

    let mut conn = Connection::open(db_path).map_err(sql_err)?;
    conn.execute_batch(schema::CREATE_TABLES).map_err(sql_err)?;

    let tx = conn.transaction().map_err(sql_err)?;
    tx.execute(
        "
        INSERT INTO col
            (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
        VALUES
            (1, ?1, ?2, ?3, ?4, 0, 0, 0, ?5, ?6, ?7, ?8, '{}')
        ",
        params![
            now_secs - now_secs % 86_400,
            now_ms,
            now_ms,
            SCHEMA_VERSION,
            serde_json::to_string(&schema::collection_conf(deck_id, model_id)).map_err(json_err)?,
            serde_json::to_string(&schema::note_types(model_id, deck_id, now_secs))
                .map_err(json_err)?,
            serde_json::to_string(&schema::decks(deck_id, &deck.name, now_secs))
                .map_err(json_err)?,
            serde_json::to_string(&schema::deck_options(now_secs)).map_err(json_err)?,
        ],
    )
    .map_err(sql_err)?;

    for entry in &deck.cards {
        let question = html_escape::encode_text(&entry.card.question);
        let answer = html_escape::encode_text(&entry.card.answer);
        let fields = format!("{question}{FIELD_SEPARATOR}{answer}");
        let position = entry.id as i64;
        let note_id = now_ms + position;

        tx.execute(
            "
            INSERT INTO notes
                (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
            VALUES
                (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')
            ",
            params![
                note_id,
                note_guid(&entry.card),
                model_id,
                now_secs,
                fields,
                &*question,
                field_checksum(&question),
            ],
        )
        .map_err(sql_err)?;

        tx.execute(
            "
            INSERT INTO cards
                (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps, lapses,
                 left, odue, odid, flags, data)
            VALUES
                (?1, ?2, ?3, 0, ?4, -1, 0, 0, ?5, 0, 0, 0, 0, 0, 0, 0, 0, '')
            ",
            params![note_id, note_id, deck_id, now_secs, position],
        )
        .map_err(sql_err)?;
    }
    tx.commit().map_err(sql_err)?;
    conn.close().map_err(|(_, e)| sql_err(e))?;
    Ok(())
}

/// Load a deck back from an `.apkg` written by [`serialize`] (or any schema-11 package).
pub fn read_deck(path: &Path) -> Result<Deck> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::io_other(path, e))?;
    let mut entry = archive.by_name(COLLECTION_ENTRY).map_err(|e| Error::io_other(path, e))?;

    let mut scratch = tempfile::NamedTempFile::new().map_err(|e| Error::io(path, e))?;
    io::copy(&mut entry, scratch.as_file_mut()).map_err(|e| Error::io(path, e))?;
    drop(entry);

    let sql_err = |e: rusqlite::Error| Error::io_other(path, e);
    let conn = Connection::open_with_flags(scratch.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(sql_err)?;

    let decks_json: String =
        conn.query_row("SELECT decks FROM col LIMIT 1", [], |row| row.get(0)).map_err(sql_err)?;
    let deck_names = deck_names(&decks_json).map_err(|e| Error::io_other(path, e))?;

    let mut stmt = conn
        .prepare(
            "
            SELECT n.flds, c.did
            FROM cards c
            JOIN notes n ON n.id = c.nid
            ORDER BY c.due, c.id
            ",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(sql_err)?;

    let mut cards = Vec::new();
    let mut card_deck = None;
    for (row, id) in rows.zip(1u64..) {
        let (fields, did) = row.map_err(sql_err)?;
        card_deck.get_or_insert(did);
        let mut parts = fields.split(FIELD_SEPARATOR);
        let question = html_escape::decode_html_entities(parts.next().unwrap_or_default());
        let answer = html_escape::decode_html_entities(parts.next().unwrap_or_default());
        cards.push(DeckCard { id, card: Flashcard::new(question, answer) });
    }

    let name = card_deck
        .and_then(|did| deck_names.get(&did).cloned())
        .or_else(|| {
            let mut named: Vec<_> =
                deck_names.iter().filter(|(id, _)| **id != DEFAULT_DECK_ID).collect();
            named.sort();
            named.first().map(|(_, name)| (*name).clone())
        })
        .unwrap_or_else(|| "Default".to_string());

    Ok(Deck { name, cards })
}

fn deck_names(decks_json: &str) -> serde_json::Result<HashMap<i64, String>> {
    let decks: HashMap<String, serde_json::Value> = serde_json::from_str(decks_json)?;
    Ok(decks
        .into_iter()
        .filter_map(|(id, deck)| {
            let id = id.parse::<i64>().ok()?;
            let name = deck.get("name")?.as_str()?.to_string();
            Some((id, name))
        })
        .collect())
}

/// Ids Anki accepts are positive and must not collide with the built-in default (1).
fn id_in_range(hash: u64) -> i64 {
    const LOW: u64 = 1 << 30;
    (LOW + hash % LOW) as i64
}

fn deck_id_for(name: &str) -> i64 {
    id_in_range(stable_hash_u64(&["deck", name]))
}

fn model_id() -> i64 {
    id_in_range(stable_hash_u64(&["note-type", schema::NOTE_TYPE_NAME]))
}

/// Base91 rendering of a content hash, the format Anki uses for note GUIDs.
fn note_guid(card: &Flashcard) -> String {
    let mut value = stable_hash_u64(&[card.question.as_str(), card.answer.as_str()]);
    let base = GUID_ALPHABET.len() as u64;
    let mut digits = Vec::new();
    loop {
        digits.push(GUID_ALPHABET[(value % base) as usize]);
        value /= base;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// First four bytes of the digest of the sort field, used by Anki for duplicate checks.
fn field_checksum(sort_field: &str) -> i64 {
    let digest = Sha256::digest(sort_field.as_bytes());
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}
