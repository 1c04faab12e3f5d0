use journal_core::model::timestamp::now;
use journal_core::{
    CampaignPatch, CampaignQuery, CharacterPatch, CharacterQuery, CoreConfig, DateRange,
    EntityKind, EntryPatch, EntryQuery, Journal, JournalEntry, NewCampaign, NewCharacter, NewEntry,
    SearchQuery, ServiceError, Sort, SqliteStore, Store, Violation,
};
use std::sync::Arc;
use uuid::Uuid;

macro_rules! journal_tests {
    ($($check:ident),* $(,)?) => {
        mod sqlite {
            $(
                #[test]
                fn $check() {
                    let store = journal_core::SqliteStore::open_in_memory().unwrap();
                    super::$check(&journal_core::Journal::with_store(std::sync::Arc::new(store)));
                }
            )*
        }

        mod memory {
            $(
                #[test]
                fn $check() {
                    let store = journal_core::MemoryStore::new();
                    super::$check(&journal_core::Journal::with_store(std::sync::Arc::new(store)));
                }
            )*
        }
    };
}

journal_tests!(
    created_entities_read_back_unchanged,
    character_needs_existing_campaign,
    entry_rejects_character_from_other_campaign,
    edit_rejects_character_from_other_campaign,
    edits_advance_updated_at_and_keep_invalid_input_out,
    campaign_delete_cascades_to_owned_rows,
    deleting_missing_campaign_is_not_found,
    failed_cascade_keeps_every_row,
    deleted_entry_is_gone,
    character_delete_detaches_entries,
    search_matches_body_and_tags,
    list_filters_apply_tags_and_date_range,
    summary_counts_every_kind,
);

fn created_entities_read_back_unchanged<S: Store>(journal: &Journal<S>) {
    let campaign = journal
        .campaigns()
        .create_campaign(NewCampaign {
            name: "Shadows of Esteren".to_string(),
            notes: "Gothic horror in Tri-Kazel".to_string(),
            tags: vec!["Horror".to_string(), "gothic".to_string()],
        })
        .unwrap();
    assert_eq!(campaign.tags, vec!["horror", "gothic"]);
    assert_eq!(campaign.created_at, campaign.updated_at);
    assert_eq!(journal.campaigns().get_campaign(campaign.id).unwrap(), campaign);

    let arwen = journal
        .characters()
        .create_character(NewCharacter::new(campaign.id, "  Arwen "))
        .unwrap();
    assert_eq!(arwen.name, "Arwen");
    assert_eq!(journal.characters().get_character(arwen.id).unwrap(), arwen);

    let entry = journal
        .entries()
        .create_entry(NewEntry::new(campaign.id, "Session 1").by(arwen.id).tagged(&["Recap"]))
        .unwrap();
    assert_eq!(entry.tags, vec!["recap"]);
    assert_eq!(journal.entries().get_entry(entry.id).unwrap(), entry);
}

fn character_needs_existing_campaign<S: Store>(journal: &Journal<S>) {
    let missing = Uuid::new_v4();
    let err = journal
        .characters()
        .create_character(NewCharacter::new(missing, "Nobody"))
        .unwrap_err();
    let violations = err.validation().unwrap();
    assert!(violations.contains(|v| matches!(
        v,
        Violation::DanglingReference { kind: EntityKind::Campaign, id, .. } if *id == missing
    )));
    assert_eq!(journal.summary().unwrap().characters, 0);
}

fn entry_rejects_character_from_other_campaign<S: Store>(journal: &Journal<S>) {
    let home = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Home"))
        .unwrap();
    let away = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Away"))
        .unwrap();
    let stranger = journal
        .characters()
        .create_character(NewCharacter::new(away.id, "Stranger"))
        .unwrap();

    let err = journal
        .entries()
        .create_entry(NewEntry::new(home.id, "Who is this?").by(stranger.id))
        .unwrap_err();
    assert!(err
        .validation()
        .unwrap()
        .contains(|v| matches!(v, Violation::CharacterCampaignMismatch { .. })));
    assert_eq!(journal.summary().unwrap().entries, 0);
}

fn edit_rejects_character_from_other_campaign<S: Store>(journal: &Journal<S>) {
    let home = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Home"))
        .unwrap();
    let away = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Away"))
        .unwrap();
    let stranger = journal
        .characters()
        .create_character(NewCharacter::new(away.id, "Stranger"))
        .unwrap();
    let entry = journal
        .entries()
        .create_entry(NewEntry::new(home.id, "Quiet night"))
        .unwrap();

    let err = journal
        .entries()
        .edit_entry(
            entry.id,
            EntryPatch {
                character_id: Some(Some(stranger.id)),
                ..EntryPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(journal.entries().get_entry(entry.id).unwrap(), entry);
}

fn edits_advance_updated_at_and_keep_invalid_input_out<S: Store>(journal: &Journal<S>) {
    let campaign = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Clockwork"))
        .unwrap();

    let renamed = journal
        .campaigns()
        .edit_campaign(
            campaign.id,
            CampaignPatch {
                name: Some("Clockwork City".to_string()),
                ..CampaignPatch::default()
            },
        )
        .unwrap();
    assert!(renamed.updated_at > campaign.updated_at);
    assert_eq!(renamed.created_at, campaign.created_at);

    let again = journal
        .campaigns()
        .edit_campaign(campaign.id, CampaignPatch::default())
        .unwrap();
    assert!(again.updated_at > renamed.updated_at);

    let err = journal
        .campaigns()
        .edit_campaign(
            campaign.id,
            CampaignPatch {
                name: Some("   ".to_string()),
                ..CampaignPatch::default()
            },
        )
        .unwrap_err();
    assert!(err
        .validation()
        .unwrap()
        .contains(|v| matches!(v, Violation::Required { field: "name" })));
    assert_eq!(journal.campaigns().get_campaign(campaign.id).unwrap(), again);

    let arwen = journal
        .characters()
        .create_character(NewCharacter::new(campaign.id, "Arwen"))
        .unwrap();
    let edited = journal
        .characters()
        .edit_character(
            arwen.id,
            CharacterPatch {
                notes: Some("Ranger".to_string()),
                ..CharacterPatch::default()
            },
        )
        .unwrap();
    assert_eq!(edited.notes, "Ranger");
    assert!(edited.updated_at > arwen.updated_at);

    let missing = journal
        .entries()
        .edit_entry(Uuid::new_v4(), EntryPatch::default())
        .unwrap_err();
    assert!(matches!(
        missing,
        ServiceError::NotFound {
            kind: EntityKind::Entry,
            ..
        }
    ));
}

fn campaign_delete_cascades_to_owned_rows<S: Store>(journal: &Journal<S>) {
    let doomed = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Doomed"))
        .unwrap();
    let kept = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Kept"))
        .unwrap();
    let hero = journal
        .characters()
        .create_character(NewCharacter::new(doomed.id, "Hero"))
        .unwrap();
    journal
        .characters()
        .create_character(NewCharacter::new(doomed.id, "Sidekick"))
        .unwrap();
    journal
        .entries()
        .create_entry(NewEntry::new(doomed.id, "Prologue").by(hero.id))
        .unwrap();
    journal
        .entries()
        .create_entry(NewEntry::new(doomed.id, "Epilogue"))
        .unwrap();
    let survivor = journal
        .entries()
        .create_entry(NewEntry::new(kept.id, "Still here"))
        .unwrap();

    let deletion = journal.campaigns().delete_campaign(doomed.id).unwrap();
    assert_eq!(deletion.entries_removed, 2);
    assert_eq!(deletion.characters_removed, 2);

    assert!(matches!(
        journal.campaigns().get_campaign(doomed.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(journal
        .characters()
        .list_characters(&CharacterQuery::for_campaign(doomed.id), None)
        .unwrap()
        .is_empty());
    assert!(journal
        .entries()
        .list_entries(&EntryQuery::for_campaign(doomed.id), None)
        .unwrap()
        .is_empty());
    assert_eq!(journal.entries().get_entry(survivor.id).unwrap(), survivor);
}

fn deleting_missing_campaign_is_not_found<S: Store>(journal: &Journal<S>) {
    let ghost = Uuid::new_v4();
    let err = journal.campaigns().delete_campaign(ghost).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound { kind: EntityKind::Campaign, id } if id == ghost
    ));
}

fn failed_cascade_keeps_every_row<S: Store>(journal: &Journal<S>) {
    let doomed = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Doomed"))
        .unwrap();
    let other = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Other"))
        .unwrap();
    let hero = journal
        .characters()
        .create_character(NewCharacter::new(doomed.id, "Hero"))
        .unwrap();
    let prologue = journal
        .entries()
        .create_entry(NewEntry::new(doomed.id, "Prologue").by(hero.id))
        .unwrap();

    // Written below the use-case layer: an entry of another campaign keeps
    // the hero referenced, so removing the hero must fail mid-cascade.
    let stray = JournalEntry::create(NewEntry::new(other.id, "Borrowed hero").by(hero.id), now());
    journal
        .store()
        .write(|repos| repos.entries().create(&stray))
        .unwrap();

    let err = journal.campaigns().delete_campaign(doomed.id).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::DeleteFailed { kind: EntityKind::Campaign, id, .. } if id == doomed.id
    ));

    assert_eq!(journal.campaigns().get_campaign(doomed.id).unwrap(), doomed);
    assert_eq!(
        journal
            .characters()
            .list_characters(&CharacterQuery::for_campaign(doomed.id), None)
            .unwrap(),
        vec![hero]
    );
    assert_eq!(
        journal
            .entries()
            .list_entries(&EntryQuery::for_campaign(doomed.id), None)
            .unwrap(),
        vec![prologue]
    );
    assert_eq!(journal.entries().get_entry(stray.id).unwrap(), stray);
}

fn deleted_entry_is_gone<S: Store>(journal: &Journal<S>) {
    let campaign = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Home"))
        .unwrap();
    let kept = journal
        .entries()
        .create_entry(NewEntry::new(campaign.id, "Kept"))
        .unwrap();
    let gone = journal
        .entries()
        .create_entry(NewEntry::new(campaign.id, "Gone"))
        .unwrap();

    journal.entries().delete_entry(gone.id).unwrap();

    assert!(matches!(
        journal.entries().get_entry(gone.id),
        Err(ServiceError::NotFound { kind: EntityKind::Entry, id }) if id == gone.id
    ));
    assert!(matches!(
        journal.entries().delete_entry(gone.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert_eq!(
        journal
            .entries()
            .list_entries(&EntryQuery::for_campaign(campaign.id), None)
            .unwrap(),
        vec![kept]
    );
    assert_eq!(journal.summary().unwrap().entries, 1);
}

fn character_delete_detaches_entries<S: Store>(journal: &Journal<S>) {
    let campaign = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Home"))
        .unwrap();
    let arwen = journal
        .characters()
        .create_character(NewCharacter::new(campaign.id, "Arwen"))
        .unwrap();
    let entry = journal
        .entries()
        .create_entry(NewEntry::new(campaign.id, "Arwen keeps watch").by(arwen.id))
        .unwrap();

    assert_eq!(journal.characters().delete_character(arwen.id).unwrap(), 1);

    let detached = journal.entries().get_entry(entry.id).unwrap();
    assert_eq!(detached.character_id, None);
    assert_eq!(detached.body, entry.body);
    assert!(detached.updated_at > entry.updated_at);
    assert!(matches!(
        journal.characters().get_character(arwen.id),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        journal.characters().delete_character(arwen.id),
        Err(ServiceError::NotFound { .. })
    ));
}

fn search_matches_body_and_tags<S: Store>(journal: &Journal<S>) {
    let home = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Home"))
        .unwrap();
    let away = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Away"))
        .unwrap();
    let by_body = journal
        .entries()
        .create_entry(NewEntry::new(home.id, "The DRAGON wakes"))
        .unwrap();
    let by_tag = journal
        .entries()
        .create_entry(NewEntry::new(home.id, "Quiet road").tagged(&["dragon-lore"]))
        .unwrap();
    let other_campaign = journal
        .entries()
        .create_entry(NewEntry::new(away.id, "A dragon elsewhere"))
        .unwrap();
    journal
        .entries()
        .create_entry(NewEntry::new(home.id, "Nothing relevant"))
        .unwrap();

    let all = journal
        .entries()
        .search_entries(&SearchQuery::new("Dragon"))
        .unwrap();
    let ids: Vec<_> = all.iter().map(|e| e.id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&by_body.id) && ids.contains(&by_tag.id) && ids.contains(&other_campaign.id));
    assert!(all.windows(2).all(|pair| pair[0].updated_at >= pair[1].updated_at));

    let scoped = journal
        .entries()
        .search_entries(&SearchQuery::new("dragon").in_campaign(home.id))
        .unwrap();
    let mut scoped_ids: Vec<_> = scoped.iter().map(|e| e.id).collect();
    scoped_ids.sort();
    let mut expected = vec![by_body.id, by_tag.id];
    expected.sort();
    assert_eq!(scoped_ids, expected);

    let limited = journal
        .entries()
        .search_entries(&SearchQuery::new("dragon").with_limit(1))
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, all[0].id);

    assert!(journal
        .entries()
        .search_entries(&SearchQuery::new("   "))
        .unwrap()
        .is_empty());
}

fn list_filters_apply_tags_and_date_range<S: Store>(journal: &Journal<S>) {
    let before = now();
    let tagged = journal
        .campaigns()
        .create_campaign(NewCampaign {
            name: "Tagged".to_string(),
            tags: vec!["oneshot".to_string()],
            ..NewCampaign::default()
        })
        .unwrap();
    journal
        .campaigns()
        .create_campaign(NewCampaign::named("Plain"))
        .unwrap();

    let by_tag = journal
        .campaigns()
        .list_campaigns(
            &CampaignQuery {
                tags_any: vec![" OneShot ".to_string()],
                ..CampaignQuery::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(by_tag, vec![tagged.clone()]);

    let recent = journal
        .campaigns()
        .list_campaigns(
            &CampaignQuery {
                sort: Sort::by_name(),
                ..CampaignQuery::default()
            },
            Some(DateRange::since(before)),
        )
        .unwrap();
    let names: Vec<_> = recent.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Plain", "Tagged"]);

    let empty_window = journal
        .campaigns()
        .list_campaigns(
            &CampaignQuery::default(),
            Some(DateRange::between(before, before)),
        )
        .unwrap();
    assert!(empty_window.is_empty());
}

fn summary_counts_every_kind<S: Store>(journal: &Journal<S>) {
    let campaign = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Counted"))
        .unwrap();
    journal
        .characters()
        .create_character(NewCharacter::new(campaign.id, "One"))
        .unwrap();
    for body in ["a", "b"] {
        journal
            .entries()
            .create_entry(NewEntry::new(campaign.id, body))
            .unwrap();
    }

    let summary = journal.summary().unwrap();
    assert_eq!(
        (summary.campaigns, summary.characters, summary.entries),
        (1, 1, 2)
    );
}

#[test]
fn data_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig::default().with_db_path(dir.path().join("journal.sqlite3"));

    let (campaign, arwen, entry) = {
        let journal = Journal::<SqliteStore>::open(&config).unwrap();
        let campaign = journal
            .campaigns()
            .create_campaign(NewCampaign::named("Shadows of Esteren"))
            .unwrap();
        let arwen = journal
            .characters()
            .create_character(NewCharacter::new(campaign.id, "Arwen"))
            .unwrap();
        let entry = journal
            .entries()
            .create_entry(NewEntry::new(campaign.id, "Session 1").by(arwen.id))
            .unwrap();
        (campaign, arwen, entry)
    };

    let journal = Journal::<SqliteStore>::open(&config).unwrap();
    assert_eq!(journal.campaigns().get_campaign(campaign.id).unwrap(), campaign);
    assert_eq!(journal.characters().get_character(arwen.id).unwrap(), arwen);
    assert_eq!(journal.entries().get_entry(entry.id).unwrap(), entry);
    assert_eq!(
        journal
            .characters()
            .characters_of(campaign.id)
            .unwrap(),
        vec![arwen]
    );
}

#[test]
fn services_are_shareable_across_threads() {
    let journal = Arc::new(Journal::with_store(Arc::new(
        SqliteStore::open_in_memory().unwrap(),
    )));
    let campaign = journal
        .campaigns()
        .create_campaign(NewCampaign::named("Shared"))
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|idx| {
            let journal = Arc::clone(&journal);
            std::thread::spawn(move || {
                journal
                    .entries()
                    .create_entry(NewEntry::new(campaign.id, format!("thread {idx}")))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(journal.summary().unwrap().entries, 4);
}
