#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use response_out::Response;
    use std::fmt;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;

    struct EventRecorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    struct FieldWriter(String);

    impl Visit for FieldWriter {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }

    impl<S: Subscriber> Layer<S> for EventRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = FieldWriter(String::new());
            event.record(&mut fields);
            self.events.lock().push(fields.0);
        }
    }

    #[test]
    fn settle_logs_from_and_to_states() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = EventRecorder {
            events: Arc::clone(&events),
        };
        let subscriber = tracing_subscriber::registry().with(recorder);

        tracing::subscriber::with_default(subscriber, || {
            let response = Response::<i32>::new();
            response.complete(None);
        });

        let events = events.lock();
        let settled = events
            .iter()
            .find(|event| event.contains("response settled"))
            .expect("Should record the transition");
        assert!(settled.contains("from=uncompleted"), "{settled}");
        assert!(settled.contains("to=completed-with-null"), "{settled}");
    }
}
