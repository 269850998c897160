//! Raw record → canonical [`ServerView`].
//!
//! Variable handling is table-driven: [`VAR_HANDLERS`] maps each
//! recognized key to the function that folds it into the view. Keys in
//! [`IGNORED_VARS`] or matching [`DENIED_FRAGMENTS`] are dropped, and
//! everything else lands in the passthrough `variables` map.
//!
//! `transform` is a pure function of its input: the variable bag is an
//! ordered map and tags keep first-seen order, so equal inputs produce
//! equal views.

use std::collections::HashMap;
use std::sync::LazyLock;

use srvlist_core::GameName;
use srvlist_state::ServerView;

use crate::decode::RawServerRecord;
use crate::locale;
use crate::sanitize::{self, sanitize};

type VarHandler = fn(&mut ServerView, &str);

/// Connect endpoint advertised by servers that hide their address.
pub const PRIVATE_PLACEHOLDER_ENDPOINT: &str = "https://private-placeholder.cfx.re/";

static VAR_HANDLERS: LazyLock<HashMap<&'static str, VarHandler>> = LazyLock::new(|| {
    HashMap::from([
        ("sv_projectName", set_project_name as VarHandler),
        ("sv_projectDesc", set_project_description as VarHandler),
        ("locale", set_locale as VarHandler),
        ("tags", set_tags as VarHandler),
        ("sv_scriptHookAllowed", set_script_hook_allowed as VarHandler),
        ("onesync_enabled", set_onesync_enabled as VarHandler),
        ("gamename", set_gamename as VarHandler),
        ("premium", set_premium as VarHandler),
        ("sv_pureLevel", set_pure_level as VarHandler),
        ("can_review", set_can_review as VarHandler),
        ("banner_connecting", set_banner_connecting as VarHandler),
        ("banner_detail", set_banner_detail as VarHandler),
        ("sv_enforceGameBuild", set_enforce_game_build as VarHandler),
    ])
});

/// Known keys with nothing worth keeping (duplicated in the data
/// section, or sensitive).
const IGNORED_VARS: &[&str] = &[
    "sv_disableClientReplays",
    "onesync",
    "gametype",
    "mapname",
    "sv_enhancedHostSupport",
    "sv_lan",
    "sv_maxClients",
    "sv_licenseKeyToken",
    "activitypubFeed",
];

/// Lowercased key fragments that mark redundant variables.
const DENIED_FRAGMENTS: &[&str] = &["banner_", "sv_project", "version", "uuid"];

/// Build the canonical view of one raw record.
pub fn transform(raw: &RawServerRecord) -> ServerView {
    let data = &raw.data;
    let mut view = ServerView::placeholder(&sanitize(&raw.endpoint_id));

    view.hostname = sanitize(&data.hostname);
    view.gametype = sanitize(&data.gametype);
    view.mapname = sanitize(&data.mapname);
    view.server = sanitize(&data.server);
    view.gamename = GameName::default().as_str().to_string();
    view.players_current = non_negative(data.clients);
    view.players_max = non_negative(data.max_clients);
    view.upvote_power = non_negative(data.upvote_power);
    view.burst_power = non_negative(data.burst_power);
    view.icon_version = data.icon_version.map(non_negative);
    view.private = is_private(&data.connect_endpoints);

    for (key, value) in &data.vars {
        apply_var(&mut view, key, value);
    }

    // Without a project name the record is incomplete and must not rank.
    if view.project_name.is_empty() {
        view.upvote_power = 0;
    }

    view
}

fn apply_var(view: &mut ServerView, key: &str, value: &str) {
    if let Some(handler) = VAR_HANDLERS.get(key) {
        handler(view, value);
        return;
    }
    if IGNORED_VARS.contains(&key) {
        return;
    }
    let lower = key.to_lowercase();
    if DENIED_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        return;
    }
    view.variables.insert(sanitize(key), sanitize(value));
}

/// A server is private when it advertises endpoints and none is public.
pub fn is_private(endpoints: &[String]) -> bool {
    !endpoints.is_empty() && !endpoints.iter().any(|e| e != PRIVATE_PLACEHOLDER_ENDPOINT)
}

fn non_negative(n: i32) -> u32 {
    n.max(0) as u32
}

fn set_project_name(view: &mut ServerView, value: &str) {
    view.project_name = sanitize::project_name(value);
}

fn set_project_description(view: &mut ServerView, value: &str) {
    view.project_description = sanitize::project_description(value);
}

fn set_locale(view: &mut ServerView, value: &str) {
    let locale = locale::resolve(value);
    view.locale = locale.tag;
    view.locale_country = locale.country;
}

fn set_tags(view: &mut ServerView, value: &str) {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.split(',') {
        let tag = sanitize(&tag.to_lowercase());
        if sanitize::keep_tag(&tag) && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    view.tags = tags;
}

fn set_script_hook_allowed(view: &mut ServerView, value: &str) {
    view.script_hook_allowed = value == "true";
}

fn set_onesync_enabled(view: &mut ServerView, value: &str) {
    view.onesync_enabled = value == "true";
}

fn set_gamename(view: &mut ServerView, value: &str) {
    let value = sanitize(value);
    if value.is_empty() {
        return;
    }
    view.gamename = value;
}

fn set_premium(view: &mut ServerView, value: &str) {
    view.premium = Some(sanitize(value));
}

fn set_pure_level(view: &mut ServerView, value: &str) {
    view.pure_level = Some(sanitize(value));
}

fn set_can_review(view: &mut ServerView, value: &str) {
    view.can_review = !value.is_empty();
}

fn set_banner_connecting(view: &mut ServerView, value: &str) {
    view.banner_connecting = sanitize(value);
}

fn set_banner_detail(view: &mut ServerView, value: &str) {
    view.banner_detail = sanitize(value);
}

fn set_enforce_game_build(view: &mut ServerView, value: &str) {
    if !value.is_empty() {
        view.enforce_game_build = sanitize(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::RawServerData;
    use srvlist_state::{DEFAULT_LOCALE, DEFAULT_LOCALE_COUNTRY};

    fn raw(vars: &[(&str, &str)]) -> RawServerRecord {
        RawServerRecord {
            endpoint_id: "kx93ab".to_string(),
            data: RawServerData {
                hostname: "^2Test ^7Server".to_string(),
                clients: 31,
                max_clients: 64,
                upvote_power: 12,
                burst_power: 3,
                icon_version: Some(-5),
                connect_endpoints: vec!["1.2.3.4:30120".to_string()],
                vars: vars
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn maps_known_variables() {
        let view = transform(&raw(&[
            ("sv_projectName", "^1Los ^3Santos"),
            ("sv_projectDesc", "  Serious RP  "),
            ("locale", "en-US"),
            ("sv_scriptHookAllowed", "true"),
            ("onesync_enabled", "True"),
            ("gamename", "gta5"),
            ("sv_enforceGameBuild", "2944"),
        ]));

        assert_eq!(view.id, "kx93ab");
        assert_eq!(view.join_id, "kx93ab");
        assert_eq!(view.project_name, "Los Santos");
        assert_eq!(view.project_description, "Serious RP");
        assert_eq!(view.locale, "en-US");
        assert_eq!(view.locale_country, "US");
        assert!(view.script_hook_allowed);
        // Strict comparison: only the exact string "true".
        assert!(!view.onesync_enabled);
        assert_eq!(view.enforce_game_build, "2944");
        assert_eq!(view.players_current, 31);
        assert_eq!(view.players_max, 64);
        assert_eq!(view.upvote_power, 12);
        assert_eq!(view.icon_version, Some(0));
        assert!(!view.private);
    }

    #[test]
    fn missing_locale_uses_default_pair() {
        let view = transform(&raw(&[("sv_projectName", "x")]));
        assert_eq!(view.locale, DEFAULT_LOCALE);
        assert_eq!(view.locale_country, DEFAULT_LOCALE_COUNTRY);
    }

    #[test]
    fn unparseable_locale_uses_default_pair() {
        let view = transform(&raw(&[("locale", "not a locale")]));
        assert_eq!(view.locale, DEFAULT_LOCALE);
        assert_eq!(view.locale_country, DEFAULT_LOCALE_COUNTRY);
    }

    #[test]
    fn tags_are_normalized_deduplicated_and_filtered() {
        let view = transform(&raw(&[("tags", " Drift, racing,DRIFT,, default ,esx ")]));
        assert_eq!(view.tags, ["drift", "racing", "esx"]);
    }

    #[test]
    fn missing_project_name_zeroes_upvote_power() {
        let view = transform(&raw(&[]));
        assert_eq!(view.project_name, "");
        assert_eq!(view.upvote_power, 0);
        assert_eq!(view.burst_power, 3);
    }

    #[test]
    fn unknown_keys_pass_through_and_denied_keys_drop() {
        let view = transform(&raw(&[
            ("discord", "discord.gg/abc"),
            ("txAdmin-version", "7.0"),
            ("server_uuid", "1234"),
            ("banner_other", "img"),
            ("sv_projectTagline", "dup"),
            ("sv_lan", "false"),
            ("mapname", "san andreas"),
        ]));
        assert_eq!(view.variables.len(), 1);
        assert_eq!(view.variables["discord"], "discord.gg/abc");
    }

    #[test]
    fn banner_keys_have_dedicated_fields() {
        let view = transform(&raw(&[
            ("banner_connecting", "https://img/a.png"),
            ("banner_detail", "https://img/b.png"),
        ]));
        assert_eq!(view.banner_connecting, "https://img/a.png");
        assert_eq!(view.banner_detail, "https://img/b.png");
        assert!(view.variables.is_empty());
    }

    #[test]
    fn gamename_defaults_to_primary_game() {
        assert_eq!(transform(&raw(&[])).gamename, "gta5");
        assert_eq!(transform(&raw(&[("gamename", "rdr3")])).gamename, "rdr3");
        assert_eq!(transform(&raw(&[("gamename", "")])).gamename, "gta5");
    }

    #[test]
    fn private_requires_all_endpoints_private() {
        let placeholder = PRIVATE_PLACEHOLDER_ENDPOINT.to_string();
        assert!(!is_private(&[]));
        assert!(is_private(&[placeholder.clone()]));
        assert!(!is_private(&[placeholder, "5.6.7.8:30120".to_string()]));
    }

    #[test]
    fn transform_is_deterministic() {
        let input = raw(&[
            ("sv_projectName", "Alpha"),
            ("tags", "b,a,c"),
            ("zeta", "1"),
            ("alpha", "2"),
            ("locale", "de_de"),
        ]);
        let first = transform(&input);
        let second = transform(&input);
        assert_eq!(first, second);
        assert_eq!(first.locale, "de-DE");
    }
}
