mod notification;
mod routing;
