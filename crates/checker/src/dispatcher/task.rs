use crate::error::TaskError;
use crate::types::{ResponsePayload, Target};
use crate::workers::{CLOUDWATCH_TASK_TYPE, CloudWatchRequest, HTTP_TASK_TYPE, HttpRequest};

/// Ordered unit of dispatch. Output order always matches this order.
pub type TaskGroup = Vec<Task>;

#[derive(Debug, Clone)]
pub enum Request {
    Http(HttpRequest),
    CloudWatch(CloudWatchRequest),
}

impl Request {
    /// Registry key of the worker pool that handles this request.
    pub fn task_type(&self) -> &'static str {
        match self {
            Request::Http(_) => HTTP_TASK_TYPE,
            Request::CloudWatch(_) => CLOUDWATCH_TASK_TYPE,
        }
    }
}

/// A worker's verdict on a task: a payload, an error, or occasionally both
/// empty when a worker had nothing to say.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub payload: Option<ResponsePayload>,
    pub error: Option<TaskError>,
}

impl Response {
    pub fn ok(payload: ResponsePayload) -> Self {
        Self {
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(err: impl Into<TaskError>) -> Self {
        Self {
            payload: None,
            error: Some(err.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub task_type: String,
    pub target: Target,
    pub request: Request,
    pub response: Option<Response>,
}

impl Task {
    pub fn new(target: Target, request: Request) -> Self {
        Self {
            task_type: request.task_type().to_string(),
            target,
            request,
            response: None,
        }
    }

    /// Route the task to a pool other than the one its request implies.
    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    pub fn respond(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }
}
