//! Structural filter chains built from dispatchers.

use ricochet::{
    Attributes, ElementName, EventSink, LifecycleDispatcher, StructuralEvent, StructuralFilter,
    Txn,
    filters::{DeferringFilter, ExtractionTrigger},
    testing::{RecordingSink, RecordingTrigger},
};

mod common;
use common::{on_fresh_thread, product_config, uri};

fn el(name: &str) -> StructuralEvent {
    StructuralEvent::start(ElementName::local(name), Attributes::new())
}

fn end(name: &str) -> StructuralEvent {
    StructuralEvent::end(ElementName::local(name))
}

fn product_model() -> StructuralEvent {
    StructuralEvent::start(
        ElementName::local("value"),
        Attributes::new().with("key", "product_model"),
    )
}

#[test]
fn test_extraction_through_dispatcher_chain() {
    on_fresh_thread(|| {
        let mut dispatcher = LifecycleDispatcher::builder("/db/products")
            .register(RecordingTrigger::named("audit"))
            .register(ExtractionTrigger::new(&product_config()).unwrap())
            .build();
        let txn = Txn::new(1);
        let doc = uri("/db/products/p1.xml");
        let mut storage = RecordingSink::new();

        dispatcher.before_create_document(&txn, &doc).unwrap();
        {
            let mut chain = dispatcher.filter_chain(&mut storage);
            assert_eq!(chain.len(), 1);
            chain
                .feed([
                    StructuralEvent::StartDocument,
                    el("content"),
                    el("properties"),
                    product_model(),
                    StructuralEvent::text("SomeName|SomeCode12345"),
                    end("value"),
                    end("properties"),
                    end("content"),
                    StructuralEvent::EndDocument,
                ])
                .unwrap();
        }
        dispatcher.after_create_document(&txn, &doc).unwrap();

        let events = storage.events();
        let value_start = events.iter().position(|e| *e == product_model()).unwrap();
        assert_eq!(
            events[value_start + 1..value_start + 7],
            [
                el("product_code"),
                StructuralEvent::text("SomeCode12345"),
                end("product_code"),
                el("product_name"),
                StructuralEvent::text("SomeName"),
                end("product_name"),
            ]
        );
        assert!(!events.contains(&el("product_variant")));
        assert_eq!(storage.texts(), ["SomeCode12345", "SomeName"]);
    });
}

#[test]
fn test_dispatcher_without_filters_forwards_unchanged() {
    let mut dispatcher = LifecycleDispatcher::builder("/db/products")
        .register(RecordingTrigger::named("audit"))
        .build();
    let mut storage = RecordingSink::new();
    let mut chain = dispatcher.filter_chain(&mut storage);
    assert!(chain.is_empty());
    chain.receive(StructuralEvent::text("as is")).unwrap();
    drop(chain);
    assert_eq!(storage.texts(), ["as is"]);
}

#[test]
fn test_deferred_events_replay_in_order() {
    let mut storage = RecordingSink::new();
    let mut filter = DeferringFilter::new();

    filter.receive(el("doc"), &mut storage).unwrap();
    filter.set_deferring(true, &mut storage).unwrap();
    for event in [el("a"), StructuralEvent::text("x"), end("a")] {
        filter.receive(event, &mut storage).unwrap();
    }
    assert_eq!(storage.events(), [el("doc")]);

    filter.set_deferring(false, &mut storage).unwrap();
    filter.receive(end("doc"), &mut storage).unwrap();
    assert_eq!(
        storage.events(),
        [el("doc"), el("a"), StructuralEvent::text("x"), end("a"), end("doc")]
    );
    assert_eq!(filter.queued(), 0);
}
