//! Anki collection schema (version 11) and the JSON blobs stored in the `col` row.

use serde_json::{json, Value};

/// Collection schema version understood by every Anki release that imports `.apkg`.
pub const SCHEMA_VERSION: i64 = 11;

/// Id Anki reserves for the "Default" deck and options group.
pub const DEFAULT_DECK_ID: i64 = 1;

pub const NOTE_TYPE_NAME: &str = "AI Flashcards Basic";

/// Separator between note fields in `notes.flds`.
pub const FIELD_SEPARATOR: char = '\u{1f}';

pub const CREATE_TABLES: &str = "
CREATE TABLE col (
    id     INTEGER PRIMARY KEY,
    crt    INTEGER NOT NULL,
    mod    INTEGER NOT NULL,
    scm    INTEGER NOT NULL,
    ver    INTEGER NOT NULL,
    dty    INTEGER NOT NULL,
    usn    INTEGER NOT NULL,
    ls     INTEGER NOT NULL,
    conf   TEXT NOT NULL,
    models TEXT NOT NULL,
    decks  TEXT NOT NULL,
    dconf  TEXT NOT NULL,
    tags   TEXT NOT NULL
);
CREATE TABLE notes (
    id    INTEGER PRIMARY KEY,
    guid  TEXT NOT NULL,
    mid   INTEGER NOT NULL,
    mod   INTEGER NOT NULL,
    usn   INTEGER NOT NULL,
    tags  TEXT NOT NULL,
    flds  TEXT NOT NULL,
    sfld  INTEGER NOT NULL,
    csum  INTEGER NOT NULL,
    flags INTEGER NOT NULL,
    data  TEXT NOT NULL
);
CREATE TABLE cards (
    id     INTEGER PRIMARY KEY,
    nid    INTEGER NOT NULL,
    did    INTEGER NOT NULL,
    ord    INTEGER NOT NULL,
    mod    INTEGER NOT NULL,
    usn    INTEGER NOT NULL,
    type   INTEGER NOT NULL,
    queue  INTEGER NOT NULL,
    due    INTEGER NOT NULL,
    ivl    INTEGER NOT NULL,
    factor INTEGER NOT NULL,
    reps   INTEGER NOT NULL,
    lapses INTEGER NOT NULL,
    left   INTEGER NOT NULL,
    odue   INTEGER NOT NULL,
    odid   INTEGER NOT NULL,
    flags  INTEGER NOT NULL,
    data   TEXT NOT NULL
);
CREATE TABLE revlog (
    id      INTEGER PRIMARY KEY,
    cid     INTEGER NOT NULL,
    usn     INTEGER NOT NULL,
    ease    INTEGER NOT NULL,
    ivl     INTEGER NOT NULL,
    lastIvl INTEGER NOT NULL,
    factor  INTEGER NOT NULL,
    time    INTEGER NOT NULL,
    type    INTEGER NOT NULL
);
CREATE TABLE graves (
    usn  INTEGER NOT NULL,
    oid  INTEGER NOT NULL,
    type INTEGER NOT NULL
);
CREATE INDEX ix_notes_usn ON notes (usn);
CREATE INDEX ix_cards_usn ON cards (usn);
CREATE INDEX ix_revlog_usn ON revlog (usn);
CREATE INDEX ix_cards_nid ON cards (nid);
CREATE INDEX ix_cards_sched ON cards (did, queue, due);
CREATE INDEX ix_revlog_cid ON revlog (cid);
CREATE INDEX ix_notes_csum ON notes (csum);
";

pub fn collection_conf(deck_id: i64, model_id: i64) -> Value {
    json!({
        "activeDecks": [deck_id],
        "curDeck": deck_id,
        "curModel": model_id.to_string(),
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "nextPos": 1,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true,
    })
}

/// Basic note type: `Question` on the front, `Answer` below a rule on the back.
pub fn note_types(model_id: i64, deck_id: i64, modified: i64) -> Value {
    let field = |name: &str, ord: i64| {
        json!({
            "name": name,
            "ord": ord,
            "sticky": false,
            "rtl": false,
            "font": "Arial",
            "size": 20,
            "media": [],
        })
    };
    json!({
        model_id.to_string(): {
            "id": model_id,
            "name": NOTE_TYPE_NAME,
            "type": 0,
            "mod": modified,
            "usn": -1,
            "sortf": 0,
            "did": deck_id,
            "tmpls": [{
                "name": "Card 1",
                "ord": 0,
                "qfmt": "{{Question}}",
                "afmt": "{{FrontSide}}<hr id=\"answer\">{{Answer}}",
                "bqfmt": "",
                "bafmt": "",
                "did": null,
                "bfont": "",
                "bsize": 0,
            }],
            "flds": [field("Question", 0), field("Answer", 1)],
            "css": ".card {\n font-family: arial;\n font-size: 20px;\n text-align: center;\n color: black;\n background-color: white;\n}\n",
            "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
            "latexPost": "\\end{document}",
            "latexsvg": false,
            "req": [[0, "any", [0]]],
            "tags": [],
            "vers": [],
        }
    })
}

pub fn decks(deck_id: i64, name: &str, modified: i64) -> Value {
    let deck = |id: i64, name: &str| {
        json!({
            "id": id,
            "name": name,
            "desc": "",
            "mod": modified,
            "usn": -1,
            "conf": DEFAULT_DECK_ID,
            "dyn": 0,
            "collapsed": false,
            "browserCollapsed": false,
            "extendNew": 10,
            "extendRev": 50,
            "newToday": [0, 0],
            "revToday": [0, 0],
            "lrnToday": [0, 0],
            "timeToday": [0, 0],
        })
    };
    json!({
        DEFAULT_DECK_ID.to_string(): deck(DEFAULT_DECK_ID, "Default"),
        deck_id.to_string(): deck(deck_id, name),
    })
}

pub fn deck_options(modified: i64) -> Value {
    json!({
        DEFAULT_DECK_ID.to_string(): {
            "id": DEFAULT_DECK_ID,
            "name": "Default",
            "mod": modified,
            "usn": 0,
            "dyn": false,
            "maxTaken": 60,
            "timer": 0,
            "autoplay": true,
            "replayq": true,
            "new": {
                "delays": [1.0, 10.0],
                "ints": [1, 4, 7],
                "initialFactor": 2500,
                "order": 1,
                "perDay": 20,
                "bury": true,
                "separate": true,
            },
            "rev": {
                "perDay": 100,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1.0,
                "maxIvl": 36500,
                "minSpace": 1,
                "bury": true,
            },
            "lapse": {
                "delays": [10.0],
                "mult": 0.0,
                "minInt": 1,
                "leechFails": 8,
                "leechAction": 0,
            },
        }
    })
}
