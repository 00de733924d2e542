//! End-to-end Paper flows over real files, with an in-memory tag store and
//! pre-seeded sidecars so no external tool or network is involved.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use papershelf_core::paper::{Paper, PaperOptions};
use papershelf_core::reconcile::{AcceptIncoming, KeepCurrent};
use papershelf_core::record::{BibRecord, Field, FieldValue};
use papershelf_core::tags::{MemoryTagStore, Tag, TagError, TagStore, TagValue};
use papershelf_core::{read_bib, save_bib};

/// Tag store handle the test can keep inspecting after the Paper takes
/// ownership of its clone.
#[derive(Clone, Default)]
struct SharedTags(Rc<RefCell<MemoryTagStore>>);

impl SharedTags {
    fn get(&self, tag: Tag) -> Option<TagValue> {
        self.0.borrow().get(tag).cloned()
    }
}

impl TagStore for SharedTags {
    fn read_all(&self) -> Result<std::collections::BTreeMap<Tag, TagValue>, TagError> {
        self.0.borrow().read_all()
    }

    fn write(&mut self, tag: Tag, value: &TagValue) -> Result<(), TagError> {
        self.0.borrow_mut().write(tag, value)
    }
}

fn make_pdf(dir: &Path, name: &str) -> PathBuf {
    let pdf = dir.join(name);
    std::fs::write(&pdf, b"%PDF-1.4 stub").unwrap();
    pdf
}

fn write_txt_sidecar(pdf: &Path, lines: &[&str]) {
    let txt = papershelf_pdf::sidecar_txt_path(pdf);
    std::fs::write(&txt, lines.join("\n")).unwrap();
}

fn sample_sidecar_record() -> BibRecord {
    let mut r = BibRecord::new();
    r.doi = "10.1039/c9sm00735k".into();
    r.author = "Smith, John and Doe, Jane".into();
    r.title = "Colloidal clusters from DNA-mediated interactions".into();
    r.year = 2019;
    r.journal = "Soft Matter".into();
    r.keywords = vec!["colloids".into(), "dna".into()];
    r.id = "Smith_2019".into();
    r.entry_type = "article".into();
    r
}

#[test]
fn construction_reconciles_filename_tags_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "2019-Smith-Soft_Matter.pdf");

    let tags = SharedTags::default();
    tags.0
        .borrow_mut()
        .write(Tag::Title, &TagValue::Text("Tagged Title Wins Gaps".into()))
        .unwrap();
    tags.0
        .borrow_mut()
        .write(Tag::Doi, &TagValue::Text("doi:10.1039/c9sm00735k".into()))
        .unwrap();

    save_bib(
        &[sample_sidecar_record()],
        &papershelf_pdf::sidecar_bib_path(&pdf),
    )
    .unwrap();

    let paper = Paper::open(&pdf, Box::new(tags), PaperOptions::default()).unwrap();
    let record = paper.record();

    // Filename defaults.
    assert_eq!(record.year, 2019);
    assert_eq!(record.author1, "Smith");
    assert_eq!(record.journal, "Soft Matter");
    // Tag values fill gaps, DOI arrives scheme-stripped.
    assert_eq!(record.doi, "10.1039/c9sm00735k");
    assert_eq!(record.title, "Tagged Title Wins Gaps");
    // Sidecar fills what is still missing; tag title keeps priority under
    // the default keep-current policy.
    assert_eq!(record.author, "Smith, John and Doe, Jane");
    assert_eq!(record.id, "Smith_2019");
}

#[tokio::test]
async fn resolve_doi_from_text_heuristics() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "draft.pdf");
    write_txt_sidecar(
        &pdf,
        &[
            "Some Journal of Things",
            "DOI: 10.1234/abcd.5678",
            "Abstract: we did things.",
        ],
    );

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();

    let doi = paper.resolve_doi(false).await.unwrap();
    assert_eq!(doi.as_deref(), Some("10.1234/abcd.5678"));
    assert_eq!(paper.record().doi, "10.1234/abcd.5678");
}

#[tokio::test]
async fn resolve_doi_prefers_existing_record_value() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "draft.pdf");
    write_txt_sidecar(&pdf, &["DOI: 10.9999/should-not-be-used"]);

    let tags = MemoryTagStore::with_tags([(
        Tag::Doi,
        TagValue::Text("doi:10.1111/from-tags".into()),
    )]);
    let mut paper = Paper::open(&pdf, Box::new(tags), PaperOptions::default()).unwrap();

    let doi = paper.resolve_doi(false).await.unwrap();
    assert_eq!(doi.as_deref(), Some("10.1111/from-tags"));
}

#[tokio::test]
async fn resolve_bibliography_reads_sidecar_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "2019-Smith-Soft_Matter.pdf");
    save_bib(
        &[sample_sidecar_record()],
        &papershelf_pdf::sidecar_bib_path(&pdf),
    )
    .unwrap();

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    let found = paper.resolve_bibliography(true, &KeepCurrent).await.unwrap();
    assert!(found);
    assert_eq!(paper.record().title, "Colloidal clusters from DNA-mediated interactions");
    assert_eq!(paper.record().keywords, vec!["colloids".to_string(), "dna".to_string()]);
    assert_eq!(
        paper.subject(),
        "Soft Matter, (2019), doi: 10.1039/c9sm00735k"
    );
}

#[test]
fn resolve_keywords_from_text() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "kw.pdf");
    write_txt_sidecar(
        &pdf,
        &["Title line", "Keywords: colloids, self-assembly, DNA. PACS 82.70"],
    );

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    let kws = paper.resolve_keywords(None, true).unwrap();
    assert_eq!(
        kws,
        vec!["DNA".to_string(), "colloids".to_string(), "self-assembly".to_string()]
    );
}

#[test]
fn resolve_keywords_explicit_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "kw.pdf");
    write_txt_sidecar(&pdf, &["Keywords: ignored, entirely"]);

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    let kws = paper
        .resolve_keywords(Some(vec!["chosen".into(), "by".into(), "hand".into()]), true)
        .unwrap();
    assert_eq!(kws, vec!["by".to_string(), "chosen".to_string(), "hand".to_string()]);
}

#[test]
fn rename_to_convention_moves_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "untitled.pdf");
    write_txt_sidecar(&pdf, &["cached text"]);
    save_bib(
        &[sample_sidecar_record()],
        &papershelf_pdf::sidecar_bib_path(&pdf),
    )
    .unwrap();

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    let new_name = paper.rename_to_convention(&AcceptIncoming).unwrap();
    assert_eq!(new_name.as_deref(), Some("2019-Smith-Soft_Matter.pdf"));

    let new_pdf = dir.path().join("2019-Smith-Soft_Matter.pdf");
    assert!(new_pdf.exists());
    assert!(!pdf.exists());
    assert!(papershelf_pdf::sidecar_txt_path(&new_pdf).exists());
    assert!(papershelf_pdf::sidecar_bib_path(&new_pdf).exists());
    assert_eq!(paper.record().local_url, "2019-Smith-Soft_Matter.pdf");
}

#[test]
fn rename_is_noop_when_name_matches() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "2019-Smith-Soft_Matter.pdf");
    save_bib(
        &[sample_sidecar_record()],
        &papershelf_pdf::sidecar_bib_path(&pdf),
    )
    .unwrap();

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    assert_eq!(paper.rename_to_convention(&AcceptIncoming).unwrap(), None);
    assert!(pdf.exists());
}

#[test]
fn rename_not_ready_without_author() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "untitled.pdf");

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    assert_eq!(paper.rename_to_convention(&AcceptIncoming).unwrap(), None);
}

#[test]
fn push_to_tags_fills_and_respects_policy() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "2019-Smith-Soft_Matter.pdf");
    save_bib(
        &[sample_sidecar_record()],
        &papershelf_pdf::sidecar_bib_path(&pdf),
    )
    .unwrap();

    let tags = SharedTags::default();
    tags.0
        .borrow_mut()
        .write(Tag::Title, &TagValue::Text("An Old Conflicting Title".into()))
        .unwrap();

    let mut paper = Paper::open(&pdf, Box::new(tags.clone()), PaperOptions::default()).unwrap();
    // Put the record in genuine disagreement with the stored tag.
    paper
        .set_field(Field::Title, "A Newly Resolved Title".into(), &AcceptIncoming)
        .unwrap();

    paper.push_to_tags(&KeepCurrent).unwrap();

    // Gap-filling writes happen; the conflicting title keeps the tag value
    // under the default policy.
    assert_eq!(
        tags.get(Tag::Doi),
        Some(TagValue::Text("doi:10.1039/c9sm00735k".into()))
    );
    assert_eq!(
        tags.get(Tag::Author),
        Some(TagValue::Text("Smith, John and Doe, Jane".into()))
    );
    assert_eq!(
        tags.get(Tag::Keywords),
        Some(TagValue::List(vec!["colloids".into(), "dna".into()]))
    );
    assert_eq!(
        tags.get(Tag::Title),
        Some(TagValue::Text("An Old Conflicting Title".into()))
    );

    // Forcing overwrites the conflict.
    paper.push_to_tags(&AcceptIncoming).unwrap();
    assert_eq!(
        tags.get(Tag::Title),
        Some(TagValue::Text("A Newly Resolved Title".into()))
    );
}

#[test]
fn set_field_routes_through_reconciler() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "2019-Smith-Soft_Matter.pdf");

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();

    // Gap fills without confirmation.
    paper
        .set_field(Field::Title, "Fresh Title".into(), &KeepCurrent)
        .unwrap();
    assert_eq!(paper.get_field(Field::Title), FieldValue::Text("Fresh Title".into()));

    // Conflict keeps old under the default policy.
    paper
        .set_field(Field::Title, "Replacement".into(), &KeepCurrent)
        .unwrap();
    assert_eq!(paper.get_field(Field::Title), FieldValue::Text("Fresh Title".into()));

    // Malformed year leaves the record intact.
    assert!(paper
        .set_field(Field::Year, "not-a-year".into(), &KeepCurrent)
        .is_err());
    assert_eq!(paper.record().year, 2019);
}

#[test]
fn sidecar_round_trip_after_save_record() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = make_pdf(dir.path(), "2019-Smith-Soft_Matter.pdf");

    let mut paper = Paper::open(
        &pdf,
        Box::new(MemoryTagStore::new()),
        PaperOptions::default(),
    )
    .unwrap();
    paper
        .set_field(Field::Author, "Smith, John".into(), &KeepCurrent)
        .unwrap();
    paper.save_record().unwrap();

    let sidecar = papershelf_pdf::sidecar_bib_path(&pdf);
    let loaded = read_bib(&sidecar).unwrap().unwrap();
    assert_eq!(loaded[0].year, 2019);
    assert_eq!(loaded[0].author, "Smith, John");
    assert_eq!(loaded[0].journal, "Soft Matter");
}
