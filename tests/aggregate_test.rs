mod common;

#[cfg(test)]
mod tests {
    use super::common::init_logging;
    use response_out::{collect, first, Error, Response};
    use std::{thread, time::Duration};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn collect_partitions_value_null_and_error() {
        init_logging();
        let five = Response::new();
        let null = Response::<i32>::new();
        let boom = Response::<i32>::new();
        let all = collect(&[five.clone(), null.clone(), boom.clone()]);

        five.complete(Some(5));
        null.complete(None);
        boom.complete_with_error("boom");

        let multi = all.get_timeout(WAIT).unwrap().unwrap();
        assert_eq!(multi.successes(), &[5]);
        assert_eq!(multi.failures().len(), 2);
        assert!(multi.failures().iter().any(|e| matches!(e, Error::Absent)));
        assert!(multi.failures().iter().any(|e| e.to_string() == "boom"));
        assert_eq!(multi.count(), 3);
    }

    #[test]
    fn collect_gathers_concurrent_completions() {
        init_logging();
        let inputs: Vec<Response<usize>> = (0..32).map(|_| Response::new()).collect();
        let all = collect(&inputs);
        let handles: Vec<_> = inputs
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, response)| {
                thread::spawn(move || {
                    if i % 4 == 0 {
                        response.complete_with_error("failed");
                    } else {
                        response.complete(Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("The producer thread has panicked");
        }

        let (mut successes, failures) = all.get_timeout(WAIT).unwrap().unwrap().into_parts();
        successes.sort_unstable();
        assert_eq!(failures.len(), 8);
        assert_eq!(successes.len(), 24);
        assert!(successes.iter().all(|i| i % 4 != 0));
    }

    #[test]
    fn first_waits_for_delayed_value() {
        init_logging();
        let never = Response::<&str>::new();
        let later = Response::<&str>::new();
        let winner = first(&[never.clone(), later.clone()]);

        let producer = later.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.complete(Some("A"));
        });

        assert_eq!(winner.get_timeout(WAIT).unwrap(), Some("A"));
        assert!(!never.is_done());
    }

    #[test]
    fn first_skips_absent_and_failed_inputs() {
        init_logging();
        let null = Response::<i32>::new();
        let failed = Response::<i32>::new();
        let value = Response::<i32>::new();
        let winner = first(&[null.clone(), failed.clone(), value.clone()]);

        null.complete(None);
        failed.complete_with_error("boom");
        assert!(!winner.is_done());
        value.complete(Some(3));

        assert_eq!(winner.get().unwrap(), Some(3));
    }

    #[test]
    fn cancelled_first_ignores_later_values() {
        init_logging();
        let input = Response::<i32>::new();
        let winner = first(&[input.clone()]);
        assert!(winner.cancel());
        input.complete(Some(1));
        assert!(winner.is_cancelled());
    }
}
