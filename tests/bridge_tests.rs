//! Integration tests for objbridge.
//!
//! These drive a [`Bridge`] against the in-process [`ObjectHeap`] the way an
//! embedding runtime would: register types, wrap objects, connect signals,
//! emit them from the native side and drain deferred failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use objbridge::prelude::*;
use objbridge::{
    ConversionError, DuplicatedArgv, ErrorRecord, InvocationError, MarshalSite, RegistrationError,
};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    heap: Arc<ObjectHeap>,
    bridge: Bridge,
    widget: NativeTypeId,
    button: NativeTypeId,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        let heap = Arc::new(ObjectHeap::new());
        let widget = heap.define_type("Widget", None).unwrap();
        let button = heap.define_type("Button", Some(widget)).unwrap();
        heap.define_signal(widget, "moved", vec![fundamentals::INT, fundamentals::INT], None)
            .unwrap();
        heap.define_signal(widget, "query", vec![], Some(fundamentals::INT))
            .unwrap();

        let bridge = Bridge::builder(heap.clone())
            .registry(Arc::new(TypeRegistry::with_fundamentals()))
            .build();
        bridge
            .register_type("Widget", "Ui::Widget", Classification::Object, None)
            .unwrap();
        Self {
            heap,
            bridge,
            widget,
            button,
        }
    }

    fn object(&self, ty: NativeTypeId) -> objbridge::ObjectId {
        self.heap.instantiate(ty).unwrap()
    }
}

fn recorder() -> (Callable, Arc<Mutex<Vec<Vec<Handle>>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let callable = Callable::new(move |args: &[Handle]| {
        sink.lock().push(args.to_vec());
        Ok(Handle::Undefined)
    });
    (callable, calls)
}

fn int(v: i64) -> Handle {
    Handle::Scalar(Scalar::Int(v))
}

// =============================================================================
// Identity and ownership
// =============================================================================

#[test]
fn borrowed_wrap_preserves_identity() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);

    let first = fx.bridge.wrap_object(object, false).unwrap();
    let second = fx.bridge.wrap_object(object, false).unwrap();

    assert!(first.same(&second));
    assert_eq!(fx.heap.ref_count(object), Some(2));
}

#[test]
fn owned_handle_released_exactly_once() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    fx.heap.ref_object(object).unwrap();

    let handle = fx.bridge.wrap_object(object, true).unwrap();
    let copies: Vec<Handle> = (0..3).map(|_| handle.clone()).collect();
    assert_eq!(fx.heap.ref_count(object), Some(2));

    drop(copies);
    assert_eq!(fx.heap.ref_count(object), Some(2));
    drop(handle);
    assert_eq!(fx.heap.ref_count(object), Some(1));
}

#[test]
fn borrowed_handle_drop_leaves_refcount() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let handle = fx.bridge.wrap_object(object, false).unwrap();
    let before = fx.heap.ref_count(object);
    drop(handle);
    assert_eq!(fx.heap.ref_count(object), before);
}

#[test]
fn rewrap_ignores_owned_flag() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let borrowed = fx.bridge.wrap_object(object, false).unwrap();
    let again = fx.bridge.wrap_object(object, true).unwrap();
    assert!(borrowed.same(&again));
    assert_eq!(again.ownership(), Some(Ownership::Borrowed));
    assert_eq!(fx.heap.ref_count(object), Some(2));
}

#[test]
fn owned_object_finalized_with_last_handle() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let handle = fx.bridge.wrap_object(object, true).unwrap();
    drop(handle);
    assert!(!fx.heap.is_alive(object));
    assert!(fx.bridge.wrap_object(object, false).is_err());
}

#[test]
fn sweep_then_rewrap_creates_fresh_wrapper() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    drop(fx.bridge.wrap_object(object, false).unwrap());
    assert_eq!(fx.bridge.sweep(), 1);
    assert_eq!(fx.heap.ref_count(object), Some(1));

    let handle = fx.bridge.wrap_object(object, false).unwrap();
    assert_eq!(fx.heap.ref_count(object), Some(2));
    drop(handle);
}

#[test]
fn transient_signal_arguments_released_by_run_pending() {
    let fx = Fixture::new();
    fx.heap
        .define_signal(fx.widget, "adopt", vec![fx.widget], None)
        .unwrap();
    let emitter = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(emitter, true).unwrap();
    let (callable, calls) = recorder();
    fx.bridge
        .signal_connect(&instance, "adopt", callable, None, ConnectFlags::empty())
        .unwrap();

    let transients: Vec<_> = (0..10).map(|_| fx.object(fx.widget)).collect();
    for &child in &transients {
        fx.heap
            .emit(emitter, "adopt", vec![NativeValue::Object(child)])
            .unwrap();
        fx.heap.unref_object(child).unwrap();
    }
    calls.lock().clear();
    assert!(transients.iter().all(|&child| fx.heap.is_alive(child)));

    assert_eq!(fx.bridge.run_pending(), Ok(0));
    assert!(transients.iter().all(|&child| !fx.heap.is_alive(child)));
    assert!(fx.heap.is_alive(emitter));
    assert_eq!(fx.bridge.live_objects(), 1);
}

#[test]
fn separate_bridges_wrap_separately() {
    let fx = Fixture::new();
    let other = Bridge::builder(fx.heap.clone())
        .registry(Arc::clone(fx.bridge.registry()))
        .build();
    let object = fx.object(fx.widget);
    let a = fx.bridge.wrap_object(object, false).unwrap();
    let b = other.wrap_object(object, false).unwrap();
    assert!(!a.same(&b));
    assert_eq!(fx.heap.ref_count(object), Some(3));
}

#[test]
fn handle_outliving_bridge_keeps_object() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let idle = fx.object(fx.widget);
    let handle = fx.bridge.wrap_object(object, false).unwrap();
    drop(fx.bridge.wrap_object(idle, false).unwrap());

    let Fixture { heap, bridge, .. } = fx;
    drop(bridge);
    assert_eq!(heap.ref_count(idle), Some(1));
    assert_eq!(heap.ref_count(object), Some(2));

    drop(handle);
    assert_eq!(heap.ref_count(object), Some(1));
}

#[test]
fn unregistered_subclass_uses_ancestor_package() {
    let fx = Fixture::new();
    let object = fx.object(fx.button);
    let handle = fx.bridge.wrap_object(object, false).unwrap();
    assert_eq!(handle.type_name(), "Ui::Widget");
    assert_eq!(fx.bridge.unwrap_object(&handle, fx.widget).unwrap(), object);
}

#[test]
fn sink_runs_on_owned_wrap() {
    let fx = Fixture::new();
    let sunk = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&sunk);
    fx.bridge.register_sink_func("Widget", move |native, object| {
        // Normalise the floating reference into a regular one.
        native.ref_object(object).unwrap();
        native.unref_object(object).unwrap();
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let owned = fx.object(fx.button);
    drop(fx.bridge.wrap_object(owned, true).unwrap());
    let borrowed = fx.object(fx.widget);
    let _held = fx.bridge.wrap_object(borrowed, false).unwrap();
    assert_eq!(sunk.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn duplicate_registration_keeps_original() {
    let fx = Fixture::new();
    let err = fx
        .bridge
        .register_type("Widget", "Ui::Widget", Classification::Object, None)
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));
    assert!(BridgeError::from(err).is_fatal());

    let registry = fx.bridge.registry();
    assert_eq!(registry.lookup_type("Ui::Widget").unwrap(), fx.widget);
    assert_eq!(&*registry.lookup_package(fx.widget).unwrap(), "Ui::Widget");
}

#[test]
fn alias_resolves_but_never_wins() {
    let fx = Fixture::new();
    fx.bridge.register_alias("Widget", "Ui::OldWidget").unwrap();
    let registry = fx.bridge.registry();
    assert_eq!(registry.lookup_type("Ui::OldWidget").unwrap(), fx.widget);
    assert_eq!(&*registry.lookup_package(fx.widget).unwrap(), "Ui::Widget");
}

// =============================================================================
// Enums and flags
// =============================================================================

fn position_type(bridge: &Bridge) -> NativeTypeId {
    bridge
        .register_enum(
            "PositionType",
            "Ui::PositionType",
            vec![
                EnumValue::new(0, "POS_LEFT", "left"),
                EnumValue::new(1, "POS_RIGHT", "right"),
                EnumValue::new(2, "POS_TOP", "top"),
            ],
        )
        .unwrap()
}

fn attach_options(bridge: &Bridge) -> NativeTypeId {
    bridge
        .register_flags(
            "AttachOptions",
            "Ui::AttachOptions",
            vec![
                EnumValue::new(1, "EXPAND", "expand"),
                EnumValue::new(2, "SHRINK", "shrink"),
                EnumValue::new(4, "FILL", "fill"),
            ],
        )
        .unwrap()
}

#[test]
fn enum_round_trip_for_every_enumerator() {
    let fx = Fixture::new();
    let ty = position_type(&fx.bridge);
    for raw in 0..3 {
        let x = TypedValue::new(ty, NativeValue::Enum(raw));
        let handle = fx.bridge.to_handle(&x).unwrap();
        let native = fx.bridge.from_handle(&handle, ty).unwrap();
        let again = fx.bridge.to_handle(&native).unwrap();
        assert_eq!(native, x);
        assert_eq!(again, handle);
    }
}

#[test]
fn enum_accepts_name_or_nick_exactly() {
    let fx = Fixture::new();
    let ty = position_type(&fx.bridge);
    let by_name = fx.bridge.from_handle(&Handle::str("POS_TOP"), ty).unwrap();
    let by_nick = fx.bridge.from_handle(&Handle::str("top"), ty).unwrap();
    assert_eq!(by_name, by_nick);

    let err = fx.bridge.from_handle(&Handle::str("Top"), ty).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Conversion(ConversionError::UnknownEnumerator { .. })
    ));
}

#[test]
fn undeclared_enum_value_fails() {
    let fx = Fixture::new();
    let ty = position_type(&fx.bridge);
    let err = fx
        .bridge
        .to_handle(&TypedValue::new(ty, NativeValue::Enum(42)))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Conversion(ConversionError::UnknownEnumerator { .. })
    ));
}

#[test]
fn flags_round_trip_ignores_order() {
    let fx = Fixture::new();
    let ty = attach_options(&fx.bridge);

    let forward = fx
        .bridge
        .from_handle(&Handle::names(["expand", "fill"]), ty)
        .unwrap();
    let backward = fx
        .bridge
        .from_handle(&Handle::names(["FILL", "expand"]), ty)
        .unwrap();
    assert_eq!(forward, backward);
    assert_eq!(forward.value, NativeValue::Flags(5));

    let handle = fx.bridge.to_handle(&forward).unwrap();
    let Handle::Scalar(Scalar::Names(mut names)) = handle else {
        panic!("flags should convert to a set of names");
    };
    names.sort();
    assert_eq!(names, vec!["expand", "fill"]);
}

#[test]
fn one_unknown_flag_fails_whole_conversion() {
    let fx = Fixture::new();
    let ty = attach_options(&fx.bridge);
    let err = fx
        .bridge
        .from_handle(&Handle::names(["expand", "bogus"]), ty)
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Conversion(ConversionError::UnknownEnumerator { ref name, .. }) if name == "bogus"
    ));
}

#[test]
fn uncovered_flag_bits_fail() {
    let fx = Fixture::new();
    let ty = attach_options(&fx.bridge);
    assert!(fx
        .bridge
        .to_handle(&TypedValue::new(ty, NativeValue::Flags(8)))
        .is_err());
}

// =============================================================================
// Closures and signals
// =============================================================================

#[test]
fn swap_semantics() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();

    let (swapped, swapped_calls) = recorder();
    let (plain, plain_calls) = recorder();
    fx.bridge
        .signal_connect(
            &instance,
            "moved",
            swapped,
            Some(Handle::str("data")),
            ConnectFlags::SWAPPED,
        )
        .unwrap();
    fx.bridge
        .signal_connect(&instance, "moved", plain, None, ConnectFlags::empty())
        .unwrap();

    fx.heap
        .emit(object, "moved", vec![NativeValue::Int(3), NativeValue::Int(4)])
        .unwrap();

    assert_eq!(swapped_calls.lock()[0], vec![Handle::str("data"), int(3), int(4)]);
    let plain_args = &plain_calls.lock()[0];
    assert_eq!(plain_args.len(), 3);
    assert!(plain_args[0].same(&instance));
    assert_eq!(plain_args[1..], [int(3), int(4)]);
}

#[test]
fn data_appended_without_swap() {
    let fx = Fixture::new();
    let closure = {
        let (callable, calls) = recorder();
        (fx.bridge.create_closure(callable, Some(Handle::str("data")), false), calls)
    };
    let object = fx.object(fx.widget);
    let params = [
        TypedValue::object(fx.widget, object),
        TypedValue::new(fundamentals::INT, NativeValue::Int(1)),
    ];
    closure.0.invoke(&params, None).unwrap();
    let calls = closure.1.lock();
    assert_eq!(calls[0].len(), 3);
    assert_eq!(calls[0][2], Handle::str("data"));
}

#[test]
fn failure_containment() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    fx.bridge.install_handler(move |captured| {
        sink.lock().push(captured.fault.message.clone());
        Ok(true)
    });

    let id = fx
        .bridge
        .signal_connect(
            &instance,
            "query",
            Callable::new(|_: &[Handle]| Err(Fault::new("handler exploded"))),
            None,
            ConnectFlags::empty(),
        )
        .unwrap();

    // The failing callable does not escape the native call.
    assert_eq!(fx.heap.emit(object, "query", vec![]), Ok(None));
    fx.bridge.signal_disconnect(&instance, id).unwrap();

    // A following probe behaves normally.
    fx.bridge
        .signal_connect(
            &instance,
            "query",
            Callable::new(|_: &[Handle]| Ok(Handle::Scalar(Scalar::Int(7)))),
            None,
            ConnectFlags::empty(),
        )
        .unwrap();
    let probe = fx.heap.emit(object, "query", vec![]).unwrap();
    assert_eq!(probe.unwrap().value, NativeValue::Int(7));

    // The failure shows up exactly once.
    assert_eq!(fx.bridge.run_pending(), Ok(1));
    assert_eq!(*seen.lock(), vec!["handler exploded".to_string()]);
    assert_eq!(fx.bridge.run_pending(), Ok(0));
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn failures_relayed_in_completion_order() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();
    for message in ["first", "second"] {
        fx.bridge
            .signal_connect(
                &instance,
                "moved",
                Callable::new(move |_: &[Handle]| Err(Fault::new(message))),
                None,
                ConnectFlags::empty(),
            )
            .unwrap();
    }
    fx.heap
        .emit(object, "moved", vec![NativeValue::Int(0), NativeValue::Int(0)])
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    fx.bridge.install_handler(move |captured| {
        sink.lock().push(captured.fault.message.clone());
        Ok(true)
    });
    fx.bridge.run_pending().unwrap();
    assert_eq!(*seen.lock(), vec!["first", "second"]);
}

#[test]
fn marshal_failure_is_synchronous() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();
    fx.bridge
        .signal_connect(
            &instance,
            "query",
            Callable::new(|_: &[Handle]| Ok(Handle::str("not a number"))),
            None,
            ConnectFlags::empty(),
        )
        .unwrap();

    let err = fx.heap.emit(object, "query", vec![]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Invocation(InvocationError::MarshalFailure {
            site: MarshalSite::Return,
            ..
        })
    ));
    assert_eq!(fx.bridge.pending_faults(), 0);
}

#[test]
fn closure_references_released_with_handler() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();
    let (callable, _) = recorder();
    let probe = callable.clone();

    let id = fx
        .bridge
        .signal_connect(&instance, "moved", callable, None, ConnectFlags::empty())
        .unwrap();
    assert_eq!(probe.ref_count(), 2);
    fx.bridge.signal_disconnect(&instance, id).unwrap();
    assert_eq!(probe.ref_count(), 1);
}

#[test]
fn closure_released_when_object_finalized() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();
    let (callable, _) = recorder();
    let probe = callable.clone();
    fx.bridge
        .signal_connect(&instance, "moved", callable, None, ConnectFlags::empty())
        .unwrap();

    drop(instance);
    assert!(!fx.heap.is_alive(object));
    assert_eq!(probe.ref_count(), 1);
}

#[test]
fn reentrant_emission_does_not_deadlock() {
    let fx = Fixture::new();
    let object = fx.object(fx.widget);
    let instance = fx.bridge.wrap_object(object, true).unwrap();
    let heap = fx.heap.clone();
    let depth = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&depth);

    fx.bridge
        .signal_connect(
            &instance,
            "moved",
            Callable::new(move |_: &[Handle]| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    heap.emit(object, "moved", vec![NativeValue::Int(0), NativeValue::Int(0)])
                        .map_err(|err| Fault::new(err.to_string()))?;
                }
                Ok(Handle::Undefined)
            }),
            None,
            ConnectFlags::empty(),
        )
        .unwrap();

    fx.heap
        .emit(object, "moved", vec![NativeValue::Int(0), NativeValue::Int(0)])
        .unwrap();
    assert_eq!(depth.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Error slot and context
// =============================================================================

#[test]
fn error_slot_survives_nested_invocations() {
    let fx = Fixture::new();
    fx.bridge.set_error_slot(Some(Fault::new("ambient")));

    let bridge = fx.bridge.clone();
    let inner = fx.bridge.create_closure(
        Callable::new(|_: &[Handle]| Err(Fault::new("inner"))),
        None,
        false,
    );
    let outer = fx.bridge.create_closure(
        Callable::new(move |_: &[Handle]| {
            assert_eq!(bridge.error_slot(), None);
            let params = [TypedValue::new(fundamentals::INT, NativeValue::Int(0))];
            inner
                .invoke(&params, None)
                .map_err(|err| Fault::new(err.to_string()))?;
            assert_eq!(bridge.error_slot(), None);
            Err(Fault::new("outer"))
        }),
        None,
        false,
    );

    let params = [TypedValue::new(fundamentals::INT, NativeValue::Int(0))];
    assert_eq!(outer.invoke(&params, None), Ok(None));
    assert_eq!(fx.bridge.error_slot(), Some(Fault::new("ambient")));
    assert_eq!(fx.bridge.pending_faults(), 2);
}

#[test]
fn other_thread_needs_context() {
    let fx = Fixture::new();
    let bridge = fx.bridge.clone();
    let (callable, calls) = recorder();
    let closure = fx.bridge.create_closure(callable, None, false);

    std::thread::spawn(move || {
        let params = [TypedValue::new(fundamentals::INT, NativeValue::Int(1))];
        let err = closure.invoke(&params, None).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            BridgeError::Invocation(InvocationError::WrongContext { current: None, .. })
        ));

        let _guard = bridge.enter();
        closure.invoke(&params, None).unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(calls.lock().len(), 1);
}

#[test]
fn foreign_context_rejected_on_home_thread() {
    let fx = Fixture::new();
    let other = Bridge::builder(fx.heap.clone())
        .registry(Arc::clone(fx.bridge.registry()))
        .build();
    let (callable, _) = recorder();
    let closure = fx.bridge.create_closure(callable, None, false);

    let _guard = other.enter();
    let params = [TypedValue::new(fundamentals::INT, NativeValue::Int(1))];
    assert!(matches!(
        closure.invoke(&params, None),
        Err(BridgeError::Invocation(InvocationError::WrongContext { .. }))
    ));
}

// =============================================================================
// Relay
// =============================================================================

#[test]
fn failing_handler_reported_synchronously() {
    let fx = Fixture::new();
    fx.bridge.install_handler(|_| Err(Fault::new("handler broke")));
    let closure = fx.bridge.create_closure(
        Callable::new(|_: &[Handle]| Err(Fault::new("boom"))),
        None,
        false,
    );
    let params = [TypedValue::new(fundamentals::INT, NativeValue::Int(0))];
    closure.invoke(&params, None).unwrap();

    assert_eq!(
        fx.bridge.run_pending(),
        Err(BridgeError::HandlerFailures(vec![Fault::new("handler broke")]))
    );
    assert_eq!(fx.bridge.pending_faults(), 0);
}

#[test]
fn relay_limit_from_config() {
    init_tracing();
    let bridge = Bridge::builder(Arc::new(ObjectHeap::new()))
        .registry(Arc::new(TypeRegistry::with_fundamentals()))
        .max_pending_faults(Some(1))
        .build();
    let closure = bridge.create_closure(
        Callable::new(|_: &[Handle]| Err(Fault::new("boom"))),
        None,
        false,
    );
    let params = [TypedValue::new(fundamentals::INT, NativeValue::Int(0))];
    for _ in 0..3 {
        closure.invoke(&params, None).unwrap();
    }
    assert_eq!(bridge.pending_faults(), 1);
}

// =============================================================================
// Boxed values, variants, callbacks, error domains
// =============================================================================

#[test]
fn boxed_default_strategy_round_trip() {
    let fx = Fixture::new();
    let rect = fx
        .bridge
        .register_type("Rect", "Geo::Rect", Classification::Boxed, None)
        .unwrap();
    let block = Block::new(vec![1u8, 2, 3, 4]);
    let handle = fx.bridge.wrap_boxed_copy(&block, rect).unwrap();
    assert_eq!(handle.type_name(), "Geo::Rect");
    assert_eq!(fx.bridge.unwrap_boxed(&handle, rect).unwrap(), block);
    assert!(matches!(
        fx.bridge.unwrap_boxed(&handle, fundamentals::INT),
        Err(BridgeError::Conversion(_))
    ));
}

#[test]
fn one_shot_callback() {
    let fx = Fixture::new();
    let record = fx.bridge.create_callback(
        Callable::new(|args: &[Handle]| {
            let name = String::from_handle(&args[0]).map_err(|e| Fault::new(e.to_string()))?;
            Ok(Handle::Scalar(Scalar::Bool(name == "--verbose")))
        }),
        None,
        vec![fundamentals::STRING],
        Some(fundamentals::BOOL),
    );
    let result = fx
        .bridge
        .invoke_callback(&record, &[NativeValue::Str("--verbose".into())])
        .unwrap();
    assert_eq!(result.unwrap().value, NativeValue::Bool(true));
    fx.bridge.destroy_callback(record);
}

#[test]
fn error_domain_round_trip() {
    let fx = Fixture::new();
    fx.bridge
        .register_enum(
            "FileError",
            "Io::FileError",
            vec![
                EnumValue::new(0, "FILE_ERROR_EXIST", "exist"),
                EnumValue::new(4, "FILE_ERROR_NOENT", "noent"),
            ],
        )
        .unwrap();
    fx.bridge
        .register_error_domain("file-error-quark", "FileError", "Io::File::Error")
        .unwrap();

    let record = ErrorRecord::new("file-error-quark", 4, "missing");
    let fault = fx.bridge.fault_from_error(&record);
    assert_eq!(fault.package.as_deref(), Some("Io::File::Error"));
    assert_eq!(fx.bridge.error_from_fault(&fault).unwrap(), record);
}

// =============================================================================
// Argument vectors
// =============================================================================

#[test]
fn duplicated_argv_survives_native_edits() {
    let mut argv = DuplicatedArgv::new("prog", ["--flag", "file.txt"]).unwrap();
    assert_eq!(argv.count(), 3);
    {
        let (count, pointers) = argv.native_parts();
        // Native parser consumed "--flag": shift the rest down.
        unsafe {
            *pointers.add(1) = *pointers.add(2);
        }
        *count = 2;
    }
    argv.update().unwrap();
    assert_eq!(argv.count(), 2);
    assert_eq!(argv.remaining(), vec!["prog", "file.txt"]);
    assert_eq!(argv.into_remaining(), vec!["prog", "file.txt"]);
}
