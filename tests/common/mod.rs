//! Shared fixtures for integration tests

#![allow(dead_code)]

use ceramic::prelude::*;
use ceramic::{FieldDiscriminator, entity_type};

entity_type!(pub Author);
entity_type!(pub BlogPost);
entity_type!(pub Mp3Song);

pub fn author() -> SchemaDescriptor {
    SchemaDescriptor::from(
        SchemaDocument::new("author")
            .with_property("name", PropertySpec::primitive("string"))
            .with_property("location", PropertySpec::primitive("string"))
            .with_required(["name", "location"]),
    )
    .with_ctor(Author::factory())
}

pub fn comment() -> SchemaDescriptor {
    SchemaDocument::new("comment")
        .with_property("text", PropertySpec::primitive("string"))
        .with_required(["text"])
        .into()
}

pub fn blog_post() -> SchemaDescriptor {
    SchemaDescriptor::from(
        SchemaDocument::new("blogPost")
            .with_property("title", PropertySpec::primitive("string"))
            .with_property("content", PropertySpec::primitive("string"))
            .with_property("author", PropertySpec::reference("author"))
            .with_property(
                "comments",
                PropertySpec::array_of(PropertySpec::reference("comment")),
            )
            .with_required(["title", "content", "author"]),
    )
    .with_ctor(BlogPost::factory())
}

pub fn song() -> SchemaDescriptor {
    SchemaDescriptor::from(
        SchemaDocument::new("song")
            .with_property("title", PropertySpec::primitive("string"))
            .with_property("artist", PropertySpec::primitive("string"))
            .with_required(["title", "artist"]),
    )
    .with_discriminator(FieldDiscriminator::default())
}

pub fn mp3() -> SchemaDescriptor {
    SchemaDescriptor::from(
        SchemaDocument::new("mp3")
            .with_property("bitrate", PropertySpec::primitive("integer"))
            .with_required(["bitrate"]),
    )
    .with_ctor(Mp3Song::factory())
}

pub fn youtube() -> SchemaDescriptor {
    SchemaDocument::new("youtube")
        .with_property(
            "url",
            PropertySpec::primitive("string").with_constraint("format", "uri".into()),
        )
        .with_required(["url"])
        .into()
}

/// References the discriminated `song` base, singly and as sides of tracks
pub fn album() -> SchemaDescriptor {
    SchemaDocument::new("album")
        .with_property("title", PropertySpec::primitive("string"))
        .with_property("single", PropertySpec::reference("song"))
        .with_property(
            "sides",
            PropertySpec::array_of(PropertySpec::array_of(PropertySpec::reference("song")))
                .with_constraint("maxItems", 2.into()),
        )
        .into()
}

pub fn music() -> VirtualSchemaGroup {
    VirtualSchemaGroup::new(song(), vec![mp3(), youtube()])
}

/// Instance with the blog and music schemas registered
pub fn ceramic() -> Ceramic {
    let ceramic = Ceramic::default();
    ceramic
        .init([author(), comment(), blog_post()], [music()])
        .expect("fixtures register");
    ceramic
}
