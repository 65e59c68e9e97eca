use crate::commands::Error;
use crate::reply::Reply;

pub trait Executable {
    fn exec(self) -> Result<Reply, Error>;
}
