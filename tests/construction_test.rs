//! Entity construction and update through the `Ceramic` façade

mod common;

use async_trait::async_trait;
use ceramic::prelude::*;
use ceramic::{BasicConstraintMatcher, EntityBuilder, FieldDiscriminator, SchemaCatalog};
use common::{Author, BlogPost, Mp3Song};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Field discriminator that counts its invocations
#[derive(Default, Clone)]
struct CountingDiscriminator {
    inner: FieldDiscriminator,
    calls: Arc<AtomicUsize>,
}

impl CountingDiscriminator {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discriminator for CountingDiscriminator {
    async fn discriminate(
        &self,
        data: &Value,
        base: &EntitySchema,
        catalog: &SchemaCatalog,
    ) -> Result<Arc<EntitySchema>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.discriminate(data, base, catalog).await
    }
}

fn with_album() -> Ceramic {
    let ceramic = common::ceramic();
    ceramic.init([common::album()], []).expect("album registers");
    ceramic
}

fn address(entity: &dyn Entity) -> *const () {
    std::ptr::from_ref(entity).cast::<()>()
}

#[tokio::test]
async fn test_nested_reference_becomes_entity() {
    let ceramic = common::ceramic();
    let schema = ceramic.schema("blogPost").await.expect("registered");

    let post = ceramic
        .construct_entity(
            &json!({
                "title": "Hello",
                "content": "World",
                "author": {"name": "Jeswin", "location": "Bangalore"}
            }),
            &schema,
            None,
        )
        .await
        .expect("constructs");

    assert!(post.is::<BlogPost>());
    assert_eq!(post.value("title"), Some(&json!("Hello")));

    let author = post
        .field("author")
        .and_then(Field::as_entity)
        .expect("author is an entity");
    assert!(author.is::<Author>());
    assert_eq!(author.value("name"), Some(&json!("Jeswin")));
    assert_eq!(author.value("location"), Some(&json!("Bangalore")));
}

#[tokio::test]
async fn test_array_of_references_builds_each_element() {
    let ceramic = common::ceramic();
    let schema = ceramic.schema("blogPost").await.expect("registered");

    let post = ceramic
        .construct_entity(
            &json!({
                "title": "Hello",
                "content": "World",
                "author": {"name": "Jeswin", "location": "Bangalore"},
                "comments": [{"text": "first"}, {"text": "second"}, "spam"]
            }),
            &schema,
            None,
        )
        .await
        .expect("constructs");

    let comments = post
        .field("comments")
        .and_then(Field::as_list)
        .expect("comments are a list");
    assert_eq!(comments.len(), 3);

    let texts: Vec<_> = comments[..2]
        .iter()
        .map(|c| c.as_entity().and_then(|e| e.value("text")).cloned())
        .collect();
    assert_eq!(texts, vec![Some(json!("first")), Some(json!("second"))]);
    assert!(comments[0].downcast_ref::<Record>().is_some());
    assert_eq!(comments[2].as_value(), Some(&json!("spam")));
}

#[tokio::test]
async fn test_discriminator_selects_variant() {
    let ceramic = common::ceramic();
    let song = ceramic.schema("song").await.expect("registered");

    let track = ceramic
        .construct_entity(
            &json!({"type": "mp3", "title": "Sunday", "artist": "Nick Drake", "bitrate": 320}),
            &song,
            Some(BuildOptions::validated()),
        )
        .await
        .expect("valid mp3");

    assert!(track.is::<Mp3Song>());
    assert_eq!(track.value("bitrate"), Some(&json!(320)));
}

#[tokio::test]
async fn test_discriminated_variant_is_validated() {
    let ceramic = common::ceramic();
    let song = ceramic.schema("song").await.expect("registered");

    let err = ceramic
        .construct_entity(
            &json!({"type": "mp3", "title": "Sunday", "artist": "Nick Drake"}),
            &song,
            Some(BuildOptions::validated()),
        )
        .await
        .expect_err("bitrate is required by mp3");

    let errors = err.constraint_errors().expect("carries errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].constraint_name, "required");
    assert_eq!(errors[0].property.as_deref(), Some("bitrate"));
}

#[tokio::test]
async fn test_unknown_variant_is_discriminator_error() {
    let ceramic = common::ceramic();
    let song = ceramic.schema("song").await.expect("registered");

    for data in [
        json!({"type": "flac", "title": "Sunday", "artist": "Nick Drake"}),
        json!({"title": "Sunday", "artist": "Nick Drake"}),
    ] {
        let err = ceramic
            .construct_entity(&data, &song, None)
            .await
            .expect_err("no such variant");
        assert!(matches!(
            err,
            CeramicError::DiscriminatorError { ref schema, .. } if schema == "song"
        ));
    }
}

#[tokio::test]
async fn test_update_keeps_identity_and_nested_entity() {
    let ceramic = common::ceramic();
    let schema = ceramic.schema("blogPost").await.expect("registered");

    let mut post = ceramic
        .construct_entity(
            &json!({
                "title": "Hello",
                "content": "World",
                "author": {"name": "Jeswin", "location": "Bangalore"}
            }),
            &schema,
            None,
        )
        .await
        .expect("constructs");

    let post_before = address(post.as_ref());
    let author_before = post
        .field("author")
        .and_then(Field::as_entity)
        .map(|author| address(author))
        .expect("author");

    ceramic
        .update_entity(
            post.as_mut(),
            &json!({"title": "Goodbye", "author": {"location": "Chennai"}}),
            &schema,
            Some(BuildOptions::validated()),
        )
        .await
        .expect("updates");

    assert_eq!(address(post.as_ref()), post_before);
    assert_eq!(post.value("title"), Some(&json!("Goodbye")));
    assert_eq!(post.value("content"), Some(&json!("World")));

    let author = post.field("author").and_then(Field::as_entity).expect("author");
    assert_eq!(address(author), author_before);
    assert!(author.is::<Author>());
    assert_eq!(author.value("name"), Some(&json!("Jeswin")));
    assert_eq!(author.value("location"), Some(&json!("Chennai")));
}

#[tokio::test]
async fn test_update_replaces_raw_reference_with_entity() {
    let ceramic = common::ceramic();
    let schema = ceramic.schema("blogPost").await.expect("registered");

    let mut post = ceramic
        .construct_entity(&json!({"title": "Hello", "content": "World"}), &schema, None)
        .await
        .expect("constructs");
    assert!(post.field("author").is_none());

    ceramic
        .update_entity(
            post.as_mut(),
            &json!({"author": {"name": "Jeswin", "location": "Bangalore"}}),
            &schema,
            None,
        )
        .await
        .expect("updates");

    let author = post.field("author").and_then(Field::as_entity).expect("author");
    assert!(author.is::<Author>());
}

#[tokio::test]
async fn test_inline_object_builds_record() {
    let ceramic = Ceramic::default();
    let inline = PropertySpec {
        kind: Some("object".into()),
        properties: [("city".to_string(), PropertySpec::primitive("string"))]
            .into_iter()
            .collect(),
        required: vec!["city".into()],
        ..PropertySpec::default()
    };
    ceramic
        .init(
            [SchemaDocument::new("venue").with_property("address", inline).into()],
            [],
        )
        .expect("init");
    let schema = ceramic.schema("venue").await.expect("registered");

    let venue = ceramic
        .construct_entity(&json!({"address": {"city": "Kochi"}}), &schema, None)
        .await
        .expect("constructs");

    let address = venue.field("address").expect("address");
    assert!(address.downcast_ref::<Record>().is_some());
    assert_eq!(address.to_value(), json!({"city": "Kochi"}));

    let errors = ceramic
        .validate_value(&json!({"address": {}}), &schema)
        .await
        .expect("validates")
        .expect("city missing");
    assert_eq!(errors[0].property.as_deref(), Some("address.city"));
}

#[tokio::test]
async fn test_registered_factory_used_without_ctor() {
    let ceramic = common::ceramic();
    ceramic.catalog().register_factory("comment", Author::factory());
    let schema = ceramic.schema("comment").await.expect("registered");

    let comment = ceramic
        .construct_entity(&json!({"text": "hi"}), &schema, None)
        .await
        .expect("constructs");
    assert!(comment.is::<Author>());
}

#[tokio::test]
async fn test_non_object_data_is_rejected() {
    let ceramic = common::ceramic();
    let schema = ceramic.schema("author").await.expect("registered");

    let err = ceramic
        .construct_entity(&json!(["not", "an", "object"]), &schema, None)
        .await
        .expect_err("arrays are not entities");
    assert!(matches!(err, CeramicError::InvalidData { .. }));
}

#[tokio::test]
async fn test_unresolvable_reference_aborts_construction() {
    let ceramic = Ceramic::default();
    ceramic
        .init(
            [SchemaDocument::new("playlist")
                .with_property("owner", PropertySpec::reference("user"))
                .into()],
            [],
        )
        .expect("init");
    let schema = ceramic.schema("playlist").await.expect("registered");

    let err = ceramic
        .construct_entity(&json!({"owner": {"name": "x"}}), &schema, None)
        .await
        .expect_err("user is unknown");
    assert!(matches!(err, CeramicError::SchemaNotFound { ref id, .. } if id == "user"));

    let bare = ceramic
        .construct_entity(&json!({}), &schema, None)
        .await
        .expect("absent references are not resolved");
    assert!(bare.field("owner").is_none());
}

#[tokio::test]
async fn test_builder_can_be_used_directly() {
    let ceramic = common::ceramic();
    let matcher = BasicConstraintMatcher::new();
    let builder = EntityBuilder::new(ceramic.catalog(), &matcher);
    let schema = ceramic.schema("author").await.expect("registered");

    let author = builder
        .construct_entity(
            &json!({"name": "Jeswin", "location": "Bangalore"}),
            &schema,
            BuildOptions::validated(),
        )
        .await
        .expect("valid");
    assert!(author.downcast_ref::<Author>().is_some());
}

#[tokio::test]
async fn test_reference_to_discriminated_base_builds_variant() {
    let ceramic = with_album();
    let album = ceramic.schema("album").await.expect("registered");

    let built = ceramic
        .construct_entity(
            &json!({
                "title": "Pink Moon",
                "single": {
                    "type": "mp3",
                    "title": "Pink Moon",
                    "artist": "Nick Drake",
                    "bitrate": 256
                }
            }),
            &album,
            Some(BuildOptions::validated()),
        )
        .await
        .expect("valid album");

    let single = built.field("single").expect("single");
    assert!(single.downcast_ref::<Mp3Song>().is_some());
    assert_eq!(single.to_value()["bitrate"], json!(256));
}

#[tokio::test]
async fn test_nested_variant_is_validated_against_variant() {
    let ceramic = with_album();
    let album = ceramic.schema("album").await.expect("registered");

    let err = ceramic
        .construct_entity(
            &json!({"single": {"type": "mp3", "title": "Road", "artist": "Nick Drake"}}),
            &album,
            Some(BuildOptions::validated()),
        )
        .await
        .expect_err("mp3 requires a bitrate");

    assert!(matches!(
        err,
        CeramicError::ValidationFailed { ref schema, .. } if schema == "album"
    ));
    let errors = err.constraint_errors().expect("carries errors");
    let bitrate = errors.for_property("single.bitrate").expect("bitrate error");
    assert_eq!(bitrate.constraint_name, "required");
}

#[tokio::test]
async fn test_nested_arrays_of_references_build_nested_lists() {
    let ceramic = with_album();
    let album = ceramic.schema("album").await.expect("registered");

    let built = ceramic
        .construct_entity(
            &json!({
                "sides": [
                    [
                        {"type": "mp3", "title": "Hazey", "artist": "Drake", "bitrate": 128},
                        {"type": "youtube", "title": "Fly", "artist": "N", "url": "https://x.y/f"}
                    ],
                    []
                ]
            }),
            &album,
            Some(BuildOptions::validated()),
        )
        .await
        .expect("valid album");

    let sides = built.field("sides").and_then(Field::as_list).expect("sides");
    assert_eq!(sides.len(), 2);
    let first = sides[0].as_list().expect("side is a list");
    assert_eq!(first.len(), 2);
    assert!(first[0].downcast_ref::<Mp3Song>().is_some());
    assert!(first[1].downcast_ref::<Record>().is_some());
    assert_eq!(sides[1].as_list().map(<[Field]>::len), Some(0));
}

#[tokio::test]
async fn test_nested_array_variant_is_validated() {
    let ceramic = with_album();
    let album = ceramic.schema("album").await.expect("registered");

    let err = ceramic
        .construct_entity(
            &json!({"sides": [[{"type": "mp3", "title": "Know", "artist": "Nick Drake"}]]}),
            &album,
            Some(BuildOptions::validated()),
        )
        .await
        .expect_err("mp3 requires a bitrate");

    let errors = err.constraint_errors().expect("carries errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].property.as_deref(), Some("sides[0][0].bitrate"));
}

#[tokio::test]
async fn test_discriminator_runs_once_per_entity() {
    let counter = CountingDiscriminator::default();
    let ceramic = Ceramic::default();
    ceramic
        .init(
            [common::album()],
            [VirtualSchemaGroup::new(
                common::song().with_discriminator(counter.clone()),
                vec![common::mp3(), common::youtube()],
            )],
        )
        .expect("init");
    let album = ceramic.schema("album").await.expect("registered");

    ceramic
        .construct_entity(
            &json!({
                "single": {"type": "mp3", "title": "Parasite", "artist": "Drake", "bitrate": 192},
                "sides": [
                    [{"type": "mp3", "title": "Harvest", "artist": "Drake", "bitrate": 192}],
                    [{"type": "youtube", "title": "Things", "artist": "N", "url": "https://x.y"}]
                ]
            }),
            &album,
            Some(BuildOptions::validated()),
        )
        .await
        .expect("valid album");

    // One call per song entity, none from validation
    assert_eq!(counter.calls(), 3);
}
