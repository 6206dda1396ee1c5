use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::{ActionArgs, ActionHandler, HostExt, HostRef, Subject};

/// Creates an action handler that feeds its arguments into the observable
/// property `output`.
///
/// Every dispatch emits exactly one [`ActionArgs`] holding all arguments in
/// call order, including the empty list. The subject behind `output` is
/// created, and written to `output`, on the first dispatch to each object.
/// `output` is usually declared with [`rx_input`](crate::rx_input) so that
/// consumers can subscribe before the first dispatch.
pub fn rx_action(output: impl Into<String>) -> ActionHandler {
    let output: Arc<str> = Arc::from(output.into());

    Arc::new(move |host: HostRef, args: ActionArgs| -> BoxFuture<'static, ()> {
        let output = Arc::clone(&output);
        Box::pin(async move {
            let field = format!("rx_action:{output}");
            let subject = match host.backing_fields().get::<Subject<ActionArgs>>(&field) {
                Some(subject) => subject,
                None => {
                    let subject = host
                        .backing_fields()
                        .get_or_insert_with(&field, Subject::<ActionArgs>::new);
                    debug!(property = %output, "installing action subject");
                    host.set_to(&output, subject.to_observable());
                    subject
                }
            };

            subject.next(args);
        })
    })
}
